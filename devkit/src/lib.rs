/*!
# Parking DevKit - Stubs et utilitaires de test pour le mesh parking

Bibliothèque de test partagée par le noeud relais et les pairs:
- Stub du client mesh MQTT (publications enregistrées, réception simulée)
- Builders de payloads de sections au format fil
- Sink de capture pour la sortie afficheur
- Niveaux de trigger scriptés
*/

pub mod mesh_stub;
pub mod test_utils;

pub use mesh_stub::{MockMeshClient, SectionPayloadBuilder};
pub use test_utils::{CaptureSink, ScriptedTrigger, TestHarness};

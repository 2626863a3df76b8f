mod assembly_tests;
mod directive_tests;
mod graph_tests;
mod version_laws;

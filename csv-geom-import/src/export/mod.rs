//! Modules d'export (couche GeoJSON, couches de rapport CSV)

pub mod geojson;
pub mod report_layers;

pub use geojson::LayerWriter;
pub use report_layers::ReportLayers;

pub mod params;
pub mod summarise;
pub mod synth;
pub mod version;

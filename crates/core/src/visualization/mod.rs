pub mod glyphs;
pub mod visualizer;

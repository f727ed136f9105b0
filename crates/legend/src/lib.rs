//! Map legends: zoom-indexed colorbars and the per-layer legend list.

pub mod colorbar;
pub mod layers_legend;
pub mod layout;
pub mod svg;

pub use colorbar::*;
pub use layers_legend::*;
pub use layout::*;
pub use svg::render_svg;

pub mod pick;
pub mod popup;
pub mod template;

pub use pick::*;
pub use popup::*;
pub use template::*;

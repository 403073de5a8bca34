pub mod ascii;
pub mod png;

pub use ascii::{print_image, render_image};
pub use png::save_png;

//! Alpha vectors, the lists that hold them, and the alpha file format.

pub mod io;
pub mod list;
pub mod node;
pub mod vector;

pub use io::{load_alpha_file, read_alpha_list, save_alpha_file, write_alpha_list, AlphaIoError};
pub use list::{max_len, AlphaList};
pub use node::{AlphaNode, NodeHandle, Provenance};

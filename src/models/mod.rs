pub mod enums;
pub mod geometry;
pub mod region;
pub mod profile;
pub mod morph_hash;
pub mod template;
pub mod report;

pub use enums::*;
pub use geometry::*;
pub use region::*;
pub use profile::*;
pub use morph_hash::*;
pub use template::*;
pub use report::*;

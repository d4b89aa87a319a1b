//! File formats at the pipeline boundary.

pub mod archive;
pub mod csv;

pub use self::archive::{
    load_archive, load_segmented, load_stack, save_archive, save_segmented, save_stack,
    ArchiveError, ArchiveValue, NamedArchive,
};
pub use self::csv::load_sample_matrix_csv;

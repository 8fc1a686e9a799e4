mod cluster;
pub(crate) mod utils;

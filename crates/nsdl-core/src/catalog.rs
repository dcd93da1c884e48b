//! Fixed table of nuScenes archives and their expected MD5 digests.
//!
//! The order of `CATALOG` is the resolution and display order; menu indices
//! refer to positions in the resolved subset of this table.

/// One known archive: filename on the server and its expected MD5 (lowercase hex).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSpec {
    pub filename: &'static str,
    pub expected_md5: &'static str,
}

impl FileSpec {
    const fn new(filename: &'static str, expected_md5: &'static str) -> Self {
        Self {
            filename,
            expected_md5,
        }
    }
}

pub const CATALOG: &[FileSpec] = &[
    FileSpec::new("v1.0-test_meta.tgz", "b0263f5c41b780a5a10ede2da99539eb"),
    FileSpec::new("v1.0-test_blobs.tgz", "e065445b6019ecc15c70ad9d99c47b33"),
    FileSpec::new("v1.0-trainval01_blobs.tgz", "cbf32d2ea6996fc599b32f724e7ce8f2"),
    FileSpec::new("v1.0-trainval02_blobs.tgz", "aeecea4878ec3831d316b382bb2f72da"),
    FileSpec::new("v1.0-trainval03_blobs.tgz", "595c29528351060f94c935e3aaf7b995"),
    FileSpec::new("v1.0-trainval04_blobs.tgz", "b55eae9b4aa786b478858a3fc92fb72d"),
    FileSpec::new("v1.0-trainval05_blobs.tgz", "1c815ed607a11be7446dcd4ba0e71ed0"),
    FileSpec::new("v1.0-trainval06_blobs.tgz", "7273eeea36e712be290472859063a678"),
    FileSpec::new("v1.0-trainval07_blobs.tgz", "46674d2b2b852b7a857d2c9a87fc755f"),
    FileSpec::new("v1.0-trainval08_blobs.tgz", "37524bd4edee2ab99678909334313adf"),
    FileSpec::new("v1.0-trainval09_blobs.tgz", "a7fcd6d9c0934e4052005aa0b84615c0"),
    FileSpec::new("v1.0-trainval10_blobs.tgz", "31e795f2c13f62533c727119b822d739"),
    FileSpec::new("v1.0-trainval_meta.tgz", "537d3954ec34e5bcb89a35d4f6fb0d4a"),
];

/// Look up a catalog entry by exact filename.
pub fn find(filename: &str) -> Option<&'static FileSpec> {
    CATALOG.iter().find(|spec| spec.filename == filename)
}

//! Installed-package listing. The real local package database (RPM header
//! decoding, install state) is out of scope for this workspace; `LocalStore`
//! is kept as a trait purely so `main.rs` demonstrates the shape a real
//! implementation would plug into, backed here by a fixed stub.

/// One row as the `list-installed` command would render it.
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub arch: String,
}

pub trait LocalStore {
    fn installed(&self) -> Vec<InstalledPackage>;
}

/// A fixed, in-memory stand-in for the installed-package database.
pub struct StubLocalStore;

impl LocalStore for StubLocalStore {
    fn installed(&self) -> Vec<InstalledPackage> {
        vec![
            InstalledPackage {
                name: "kernel".into(),
                version: "6.8.5".into(),
                arch: "x86_64".into(),
            },
            InstalledPackage {
                name: "glibc".into(),
                version: "2.39".into(),
                arch: "x86_64".into(),
            },
        ]
    }
}

use gobox_contracts::{
    DEFAULT_SCRATCH_ROOT, DEFAULT_TOOLCHAIN_ROOT, TOOLCHAIN_DRIVER_REL, TOOLCHAIN_TOOLS_REL,
};
use gobox_vfs::path;

/// Where the toolchain image lives inside an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub root: String,
    /// Helper module that writes the build plan.
    pub driver: String,
    /// Directory plan tool names resolve against.
    pub tools_dir: String,
    pub scratch_root: String,
}

impl Toolchain {
    pub fn at(root: impl Into<String>) -> Self {
        let root = path::normalize(&root.into());
        Toolchain {
            driver: path::join(&root, TOOLCHAIN_DRIVER_REL),
            tools_dir: path::join(&root, TOOLCHAIN_TOOLS_REL),
            scratch_root: DEFAULT_SCRATCH_ROOT.to_string(),
            root,
        }
    }

    pub fn with_scratch_root(mut self, scratch_root: impl Into<String>) -> Self {
        self.scratch_root = path::normalize(&scratch_root.into());
        self
    }

    pub fn tool_path(&self, name: &str) -> String {
        path::join(&self.tools_dir, name)
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Toolchain::at(DEFAULT_TOOLCHAIN_ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let tc = Toolchain::default();
        assert_eq!(tc.root, "/usr/lib/go");
        assert_eq!(tc.driver, "/usr/lib/go/bin/buildhelper");
        assert_eq!(tc.tools_dir, "/usr/lib/go/pkg/tool/js_wasm");
        assert_eq!(tc.tool_path("compile"), "/usr/lib/go/pkg/tool/js_wasm/compile");
        assert_eq!(tc.scratch_root, "/tmp/build");
    }

    #[test]
    fn custom_root_is_normalized() {
        let tc = Toolchain::at("/opt/go/").with_scratch_root("/scratch/");
        assert_eq!(tc.driver, "/opt/go/bin/buildhelper");
        assert_eq!(tc.scratch_root, "/scratch");
    }
}

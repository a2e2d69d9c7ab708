//! Bakes build metadata (version, build time, rustc) into the binary for the startup banner.

fn main() {
    built::write_built_file().expect("failed to collect build-time information");
}

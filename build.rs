fn main() {
    // Embed git commit and build metadata, exposed through `built_info`.
    built::write_built_file().expect("Failed to acquire build-time information");
}

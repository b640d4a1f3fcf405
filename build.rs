// build.rs

fn main() {
    // Generate build info (exposed by `check` as VERGEN_BUILD_TIMESTAMP)
    vergen::EmitBuilder::builder()
        .all_build()
        .emit()
        .expect("Unable to generate build info");
}

fn main() -> std::io::Result<()> {
    println!("cargo:rerun-if-changed=proto/messages.proto");
    prost_build::compile_protos(&["proto/messages.proto"], &["proto/"])
}

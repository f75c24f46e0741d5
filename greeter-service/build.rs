use std::env::var;
use std::io::Result;

fn main() -> Result<()> {
    let proto_files = &["proto/helloworld.proto"];

    // Name of the folder containing the proto definitions
    let proto_folder = "proto";
    let out_dir = var("OUT_DIR").expect("Missing OUT_DIR environment variable");
    let descriptors_path = format!("{}/descriptors.bin", out_dir);

    // Only the client is generated: the server side is always served dynamically.
    tonic_prost_build::configure()
        .file_descriptor_set_path(descriptors_path)
        .build_server(false)
        .build_client(true)
        .compile_protos(proto_files, &[proto_folder])?;

    Ok(())
}

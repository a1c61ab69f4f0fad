use assert_fs::TempDir;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;

/// A small export folder: two paired photos, one video without a record.
pub fn setup_test_export(temp_dir: &TempDir) -> ChildPath {
    let export_dir = temp_dir.child("Takeout");
    export_dir.child("Photos from 2020/IMG_0100.JPG").write_binary(b"jpeg-1").unwrap();
    export_dir
        .child("Photos from 2020/IMG_0100.JPG.json")
        .write_str(r#"{"title": "IMG_0100.JPG", "photoTakenTime": {"timestamp": "1600000000"}}"#)
        .unwrap();
    export_dir.child("Photos from 2020/IMG_0101.JPG").write_binary(b"jpeg-2").unwrap();
    export_dir
        .child("Photos from 2020/IMG_0101.JPG.supplemental-metadata.json")
        .write_str(r#"{"title": "IMG_0101.JPG", "photoTakenTime": {"timestamp": "1600000100"}}"#)
        .unwrap();
    export_dir.child("Photos from 2020/VID_0102.mp4").write_binary(b"mp4").unwrap();
    export_dir
}

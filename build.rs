fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "espidf" {
        // Host builds run the simulation and the test suite only.
        return;
    }

    embuild::espidf::sysenv::output();

    if std::env::var("CARGO_FEATURE_EDGE_IMPULSE").is_ok() {
        // The Core2 is a classic ESP32, so we need the Xtensa C++ compiler from
        // the Embuild toolchain directory, typically:
        // .embuild/espressif/tools/xtensa-esp-elf/esp-<VER>/xtensa-esp-elf/bin/xtensa-esp32-elf-g++
        let compiler = find_compiler().unwrap_or_else(|| "xtensa-esp32-elf-g++".into());
        build_ei(&compiler);
    }
}

fn find_compiler() -> Option<std::path::PathBuf> {
    use std::path::PathBuf;

    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").ok()?);
    let search_dirs = vec![
        manifest_dir.join(".embuild"),
        dirs::home_dir().map(|h| h.join(".espressif")).unwrap_or_default(),
    ];

    for root in search_dirs {
        let tools_dir = root.join("espressif/tools/xtensa-esp-elf");
        let Ok(entries) = std::fs::read_dir(&tools_dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let candidate = entry
                .path()
                .join("xtensa-esp-elf/bin/xtensa-esp32-elf-g++");
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}

fn build_ei(compiler_path: &std::path::Path) {
    use std::path::PathBuf;

    // Exported "C++ library" deployment of the cough/sneeze impulse.
    let sdk_root = PathBuf::from("cough-detection_inferencing");

    let mut build = cc::Build::new();
    build
        .cpp(true)
        .compiler(compiler_path)
        .flag("-std=c++14")
        .flag("-O3")
        .define("EI_CLASSIFIER_TFLITE_ENABLE_CMSIS_NN", "0")
        .define("EI_NATIVE_ARCH", "1")
        .include(&sdk_root)
        .include(sdk_root.join("src"))
        .include(sdk_root.join("src/edge-impulse-sdk"))
        .include(sdk_root.join("src/model-parameters"))
        .include(sdk_root.join("src/tflite-model"))
        .file("csrc/ei_shim.cpp");

    add_source_files(&mut build, &sdk_root.join("src"));

    build.compile("edge-impulse-sdk");

    println!("cargo:rerun-if-changed=cough-detection_inferencing");
    println!("cargo:rerun-if-changed=csrc/ei_shim.cpp");
}

fn add_source_files(build: &mut cc::Build, dir: &std::path::Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        println!("cargo:warning=missing Edge Impulse sources in {}", dir.display());
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            add_source_files(build, &path);
        } else if let Some(ext) = path.extension() {
            if ext == "c" || ext == "cpp" || ext == "cc" {
                build.file(&path);
            }
        }
    }
}

use isa::csv::tokenize;
use isa::{EntrypointDisassemblyStore, Error};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const HEADER: &str = "Address, Source Line Number, Opcode, Operands, Functional Unit, Cycles, Binary Encoding";

fn write(dir: &TempDir, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn source_order_is_file_order() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "k.csv",
        &[
            "0x0000,11,s_mov_b32,\"s0, s1\",Scalar ALU,4,BE800001",
            "0x0004,10,v_mov_b32,\"v0, v1\",Vector ALU,4,7E000301",
            "0x0008,11,s_add_u32,\"s2, s0, 4\",Scalar ALU,4,80028400",
        ],
    );

    let mut store = EntrypointDisassemblyStore::new();
    store.load_from_csv(&path).unwrap();
    assert_eq!(store.disassembly_lines_for_source(11), &[0, 2]);
    assert_eq!(store.disassembly_lines_for_source(10), &[1]);
    assert_eq!(store.entrypoint_bounds(), Some((10, 11)));
}

#[test]
fn second_load_is_noop() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "k.csv",
        &[
            "label_0000:",
            "0x0000,3,s_load_dword,\"s0, s[4:5], 0x0\",Scalar Memory,4,C0020002",
            "0x0008,-1,s_endpgm,,Flow Control,4,BF810000",
        ],
    );

    let mut store = EntrypointDisassemblyStore::new();
    store.load_from_csv(&path).unwrap();
    let first = store.correlation().clone();
    assert!(store.is_loaded());

    // replaced on disk, but the store keeps what it parsed
    write(&dir, "k.csv", &["0x0000,99,s_nop,0,Scalar ALU,4,BF800000"]);
    store.load_from_csv(&path).unwrap();
    assert_eq!(store.correlation(), &first);
    assert_eq!(store.len(), 3);
    assert_eq!(store.disassembly_lines_for_source(99), &[] as &[usize]);
}

#[test]
fn bad_row_reports_file_line() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "bad.csv",
        &[
            "0x0000,1,s_nop,0,Scalar ALU,4,BF800000",
            "0x0004,2,s_nop,0,Scalar ALU,4,BF800000",
            "0x0008,3,s_nop,0,Scalar ALU,4,BF800000",
            "0x000C,4,s_nop,0,Scalar ALU",
        ],
    );

    let mut store = EntrypointDisassemblyStore::new();
    let err = store.load_from_csv(&path).unwrap_err();
    assert_eq!(err.line(), Some(5));
    assert!(matches!(err.root(), Error::ColumnCount { found: 5, .. }));
    assert!(err.to_string().contains(":5:"));
    assert!(!store.is_loaded());
    assert!(store.is_empty());
    assert!(store.correlation().is_empty());
}

#[test]
fn missing_file() {
    let dir = TempDir::new().unwrap();
    let mut store = EntrypointDisassemblyStore::new();
    let err = store.load_from_csv(dir.path().join("none.csv")).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
    assert!(!store.is_loaded());
}

#[test]
fn every_correlated_row_maps_back() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<String> = (0..40)
        .map(|i| {
            let source = if i % 7 == 0 { "-1".to_string() } else { ((i * 13) % 17).to_string() };
            format!("0x{:04X},{},v_nop,,Vector ALU,4,7E000000", i * 4, source)
        })
        .collect();
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    let path = write(&dir, "many.csv", &rows);

    let mut store = EntrypointDisassemblyStore::new();
    store.load_from_csv(&path).unwrap();
    for idx in 0..store.len() {
        match store.source_line_for_disassembly_line(idx) {
            Some(source) => {
                assert!(store.disassembly_lines_for_source(source).contains(&idx));
                assert!(store.is_source_line_in_entrypoint(source));
            }
            None => assert_eq!(idx % 7, 0),
        }
    }
}

macro_rules! rejoin {
    ($($name:ident: $line:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let tokens = tokenize($line).unwrap();
                assert_eq!(tokenize(&tokens.join(",")).unwrap(), tokens);
            }
        )*
    }
}

rejoin! {
    rejoin_plain: "0x0000,4,s_nop,0,Scalar ALU,4,BF800000",
    rejoin_quoted: "0x0000,4,s_nop,\"0\",Scalar ALU,4,BF800000",
    rejoin_empty_fields: ",,,",
    rejoin_label: "label_BB0_1:",
}

#[test]
fn quoted_comma() {
    assert_eq!(tokenize("a,\"b,c\",d").unwrap(), vec!["a", "b,c", "d"]);
}

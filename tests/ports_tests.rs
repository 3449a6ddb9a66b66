use lan_miner_scan::ports::{load_ports_from_path, parse_ports_str, resolve_ports};
use std::io::Write;

#[test]
fn parse_lines_ranges_and_comments() {
    let input = r#"
        # miner API ports
        4028
        4029-4031, 4028  # duplicate
        # blank line follows

    "#;

    let ports = parse_ports_str(input).expect("parse ok");
    assert_eq!(ports, vec![4028, 4029, 4030, 4031]);
}

#[test]
fn invalid_port_rejected() {
    assert!(parse_ports_str("0\n").is_err());
    assert!(parse_ports_str("4028-").is_err());
}

#[test]
fn ports_file_is_loaded() {
    let path = std::env::temp_dir().join(format!("lan-miner-scan-ports-{}.txt", std::process::id()));
    {
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "4028\n4040 # second rig").unwrap();
    }
    assert_eq!(load_ports_from_path(&path).unwrap(), vec![4028, 4040]);
    assert_eq!(resolve_ports(path.to_str().unwrap()).unwrap(), vec![4028, 4040]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn missing_ports_file_is_an_error() {
    assert!(load_ports_from_path("/definitely/not/here/ports.txt").is_err());
}

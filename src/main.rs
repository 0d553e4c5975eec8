use clap::{Arg, ArgAction, Command};
use clap_num::maybe_hex;
use prettytable::{Cell, Row, Table};
use std::process;

use lvm2_core::{Access, Handle, Whence};

fn main() {
    let matches = Command::new("lvmls")
        .version("0.1")
        .author("ForensicXlab")
        .about("Reads LVM2 metadata and lists the volume group's PVs, LVs and segments")
        .arg(
            Arg::new("primary")
                .short('p')
                .long("primary")
                .value_parser(clap::value_parser!(String))
                .required(true)
                .help("Path to the PV file/device carrying the label and metadata area"),
        )
        .arg(
            Arg::new("pv")
                .long("pv")
                .value_parser(clap::value_parser!(String))
                .action(ArgAction::Append)
                .help(
                    "Path to a PV backing file, one per --pv, in the order the volume group \
                     declares them. Defaults to --primary alone for single-PV volume groups.",
                ),
        )
        .arg(
            Arg::new("lv")
                .long("lv")
                .value_parser(clap::value_parser!(String))
                .help("Name of a logical volume to dump bytes from"),
        )
        .arg(
            Arg::new("offset")
                .short('o')
                .long("offset")
                .value_parser(maybe_hex::<u64>)
                .default_value("0")
                .help("Logical-volume byte offset to start reading from (with --lv)"),
        )
        .arg(
            Arg::new("length")
                .short('l')
                .long("length")
                .value_parser(maybe_hex::<u64>)
                .default_value("0")
                .help("Number of bytes to dump from the logical volume (with --lv)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose logging"),
        )
        .get_matches();

    let primary_path = matches.get_one::<String>("primary").unwrap();
    let pv_paths: Vec<String> = matches
        .get_many::<String>("pv")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();
    let lv_name = matches.get_one::<String>("lv");
    let offset = *matches.get_one::<u64>("offset").unwrap();
    let length = *matches.get_one::<u64>("length").unwrap();
    let verbose = *matches.get_one::<bool>("verbose").unwrap_or(&false);

    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else {
        env_logger::init();
    }

    let mut handle = Handle::new();
    if let Err(e) = handle.open_primary(primary_path, Access::Read) {
        eprintln!("Error opening LVM metadata: {e}");
        process::exit(1);
    }

    print_volume_group_info(&handle);

    let pv_paths = if pv_paths.is_empty() {
        vec![primary_path.clone()]
    } else {
        pv_paths
    };
    if let Err(e) = handle.bind_physical_volumes(&pv_paths) {
        eprintln!("Error binding physical volume pool: {e}");
        process::exit(1);
    }

    if let Some(name) = lv_name {
        let mut lv = match handle.open_lv_by_name(name) {
            Ok(lv) => lv,
            Err(e) => {
                eprintln!("Error opening logical volume '{name}': {e}");
                process::exit(1);
            }
        };
        let length = if length == 0 { lv.size().saturating_sub(offset) } else { length };
        let mut buf = vec![0u8; length as usize];
        lv.seek(
            i64::try_from(offset).unwrap_or(i64::MAX),
            Whence::Set,
        )
        .ok();
        match lv.read(&mut buf) {
            Ok(n) => {
                use std::io::Write;
                std::io::stdout().write_all(&buf[..n]).ok();
            }
            Err(e) => {
                eprintln!("Error reading logical volume '{name}': {e}");
                process::exit(1);
            }
        }
    }
}

/// Display the volume group, its PVs, LVs and segments in one table.
fn print_volume_group_info(handle: &Handle) {
    let vg = match handle.volume_group() {
        Ok(vg) => vg,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Volume Group"),
        Cell::new("Physical Volume"),
        Cell::new("Logical Volume"),
        Cell::new("Segment"),
    ]));

    let vg_info = format!(
        "Name: {}\nID: {}\nExtent Size: {} bytes\nSeqno: {}",
        vg.name, vg.identifier, vg.extent_size_bytes, vg.seqno
    );

    for pv in &vg.physical_volumes {
        let pv_info = format!(
            "Name: {}\nID: {}\nDevice: {}\nSize: {} bytes",
            pv.name, pv.identifier, pv.device_path, pv.size_bytes
        );

        if vg.logical_volumes.is_empty() {
            table.add_row(Row::new(vec![
                Cell::new(&vg_info),
                Cell::new(&pv_info),
                Cell::new("-"),
                Cell::new("-"),
            ]));
            continue;
        }

        for lv in &vg.logical_volumes {
            let lv_info = format!(
                "Name: {}\nID: {}\nSize: {} bytes",
                lv.name,
                lv.identifier,
                lv.size_bytes()
            );
            if lv.segments.is_empty() {
                table.add_row(Row::new(vec![
                    Cell::new(&vg_info),
                    Cell::new(&pv_info),
                    Cell::new(&lv_info),
                    Cell::new("No segments"),
                ]));
                continue;
            }
            for segment in &lv.segments {
                let seg_info = format!(
                    "Name: {}\nOffset: {}\nSize: {}\nType: {}\nStripes: {}",
                    segment.name,
                    segment.offset_bytes,
                    segment.size_bytes,
                    segment.type_tag,
                    segment.stripes.len(),
                );
                table.add_row(Row::new(vec![
                    Cell::new(&vg_info),
                    Cell::new(&pv_info),
                    Cell::new(&lv_info),
                    Cell::new(&seg_info),
                ]));
            }
        }
    }

    table.printstd();
}

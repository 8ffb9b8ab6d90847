use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ucr-did"))
}

fn tmp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("ucr_cli_{}_{}_{}", std::process::id(), nanos, tag));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn stdout_json(out: &Output) -> serde_json::Value {
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).unwrap()
}

/// Twelve agencies in four states over 2014..=2020, plus one District of
/// Columbia agency removed by the state exclusion. A third of the agencies never
/// switch; the rest switch in January 2017 or mid-2018 and gain three crimes
/// a year from the switch year on.
fn write_fixture(dir: &Path) -> PathBuf {
    let states = ["Iowa", "Ohio", "Utah", "Maine"];
    let mut csv =
        String::from("ori,state,date,nibrs_start_date,crime,crime_rate,murder,murder_rate\n");
    for (s, state) in states.iter().enumerate() {
        for k in 0..3 {
            let ori = format!("XX{:02}{:05}", s, k);
            let onset = match k {
                0 => None,
                1 => Some(2017),
                _ => Some(2018),
            };
            let onset_cell = match onset {
                Some(2018) => "2018-07-15".to_string(),
                Some(g) => format!("{g}-01-15"),
                None => String::new(),
            };
            for year in 2014..=2020 {
                let treated = onset.is_some_and(|g| year >= g);
                let effect = if treated { 3.0 } else { 0.0 };
                let crime = 40.0 + 5.0 * s as f64 + k as f64 + (year - 2014) as f64 + effect;
                let murder = 2.0 + k as f64 + if treated { 1.0 } else { 0.0 };
                csv.push_str(&format!(
                    "{ori},{state},{year}-01-01,{onset_cell},{crime},{},{murder},{}\n",
                    crime / 10.0,
                    murder / 10.0,
                ));
            }
        }
    }
    for year in 2014..=2020 {
        csv.push_str(&format!("DC00000,District of Columbia,{year}-01-01,,50,5,1,0.1\n"));
    }
    let path = dir.join("panel.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn write_config(dir: &Path) -> PathBuf {
    write_fixture(dir);
    let cfg = dir.join("run.yaml");
    std::fs::write(
        &cfg,
        "input: panel.csv\nout_dir: out\nfrequency: annual\ncategories: [murder, crime]\n",
    )
    .unwrap();
    cfg
}

#[test]
fn version_prints_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.starts_with("ucr-did "), "{text}");
}

#[test]
fn run_writes_artifacts_and_combine_rebuilds_master() {
    let dir = tmp_dir("run");
    let cfg = write_config(&dir);
    let out = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    let summary = stdout_json(&out);
    assert_eq!(summary["source"], "fbi");
    assert_eq!(summary["balance"]["units_kept"], 12);
    let cats = summary["categories"].as_array().unwrap();
    assert_eq!(cats.len(), 2);
    let att = cats[1]["simple_att"].as_f64().unwrap();
    assert!((att - 3.0).abs() < 1e-8, "crime ATT {att}");

    let out_dir = dir.join("out");
    for name in [
        "fbi_c_effect_size.csv",
        "fbi_c_simple_att.csv",
        "fbi_c_event_study.svg",
        "fbi_c_event_study.json",
        "fbi_c_table.tex",
        "fbi_m_effect_size.csv",
        "fbi_m_simple_att.csv",
        "fbi_m_table.tex",
        "fbi_did_table.tex",
    ] {
        assert!(out_dir.join(name).exists(), "missing {name}");
    }

    std::fs::remove_file(out_dir.join("fbi_did_table.tex")).unwrap();
    let combined = stdout_json(&run(&[
        "combine",
        "--out-dir",
        out_dir.to_string_lossy().as_ref(),
        "--source",
        "fbi",
    ]));
    assert_eq!(combined["columns"], serde_json::json!(["Total Crime", "Murder"]));
    assert!(out_dir.join("fbi_did_table.tex").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn placebo_and_source_overrides_change_file_names() {
    let dir = tmp_dir("placebo");
    let cfg = write_config(&dir);
    let alt_out = dir.join("alt_out");
    let out = run(&[
        "run",
        "--config",
        cfg.to_string_lossy().as_ref(),
        "--source",
        "alt",
        "--placebo",
        "--out-dir",
        alt_out.to_string_lossy().as_ref(),
    ]);
    let summary = stdout_json(&out);
    assert_eq!(summary["source"], "alt");
    assert_eq!(summary["placebo"], true);
    assert!(alt_out.join("alt_c_placebo_effect_size.csv").exists());
    assert!(alt_out.join("alt_placebo_did_table.tex").exists());
    assert!(!dir.join("out").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn inspect_reports_balanced_panel() {
    let dir = tmp_dir("inspect");
    let cfg = write_config(&dir);
    let summary = stdout_json(&run(&["inspect", "--config", cfg.to_string_lossy().as_ref()]));
    assert_eq!(summary["units"], 12);
    assert_eq!(summary["never_treated_units"], 4);
    assert_eq!(summary["periods"], 7);
    assert_eq!(summary["balance"]["rows_excluded"], 7);
    assert_eq!(summary["balance"]["units_dropped"], 0);
    assert_eq!(summary["first_period"], "2014-01");
    let cats = summary["categories"].as_array().unwrap();
    assert!(cats.iter().all(|c| c["count_column_present"] == true));
    assert!(!dir.join("out").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_input_fails_with_message() {
    let dir = tmp_dir("missing");
    let cfg = dir.join("run.yaml");
    std::fs::write(&cfg, "input: nope.csv\n").unwrap();
    let out = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("nope.csv"));
    let _ = std::fs::remove_dir_all(&dir);
}

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Arg, Command};
use tracing::info;

use protonpol::analysis::{self, OfflineAnalysis};
use protonpol::logging::{init_logging, level_from_verbosity, parse_log_level, LogConfig, LogOutput};
use protonpol::run_action::RunSummary;
use protonpol::scenario::ScenarioConfig;
use protonpol::simulation::SimulationEngine;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("protonpol")
        .version("0.1.0")
        .about("陽子散乱角シミュレーション (Proton Polarimetry)")
        .long_about("2枚のドリフトチェンバーで陽子の散乱角を測定するシミュレーション\n\
                     イベントごとに散乱角のヒストグラムとイベントツリーを作成します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、組み込みのデフォルトシナリオで実行されます。")
        )
        .arg(
            Arg::new("events")
                .short('n')
                .long("events")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .help("イベント数を上書き")
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .help("乱数シードを上書き")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。-v より優先")
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .value_name("FILE")
                .help("ランのまとめを書き出すYAMLファイル")
        )
        .arg(
            Arg::new("analyze")
                .long("analyze")
                .action(clap::ArgAction::SetTrue)
                .help("ラン終了後にイベントツリーのオフライン解析を行う")
        )
        .get_matches();

    println!("陽子散乱角シミュレーション (Proton Polarimetry) - protonpol v0.1.0");
    println!();

    let verbose_level = matches.get_count("verbose");

    let output = match matches.get_one::<String>("log-output").map(|s| LogOutput::from_str(s)) {
        Some(Ok(output)) => output,
        Some(Err(e)) => {
            eprintln!("エラー: {}", e);
            std::process::exit(2);
        }
        None => LogOutput::Console,
    };
    let level = match matches.get_one::<String>("log-level") {
        Some(level) => parse_log_level(level),
        None => level_from_verbosity(verbose_level),
    };
    // ファイル出力のバッファはガードの破棄時に書き出される
    let _guard = match init_logging(LogConfig { level, output, ..LogConfig::default() }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    let options = RunOptions {
        scenario_path: matches.get_one::<String>("scenario").map(PathBuf::from),
        events: matches.get_one::<u64>("events").copied(),
        seed: matches.get_one::<u64>("seed").copied(),
        info_only: matches.get_flag("info"),
        summary_path: matches.get_one::<String>("summary").map(PathBuf::from),
        analyze: matches.get_flag("analyze"),
        verbose_level,
    };

    match run_scenario(options) {
        Ok(_) => {
            if verbose_level > 0 {
                println!("シナリオ実行が正常に完了しました。");
            }
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    }
}

struct RunOptions {
    scenario_path: Option<PathBuf>,
    events: Option<u64>,
    seed: Option<u64>,
    info_only: bool,
    summary_path: Option<PathBuf>,
    analyze: bool,
    verbose_level: u8,
}

/// シナリオを読み込んで実行
fn run_scenario(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut scenario = match &options.scenario_path {
        Some(path) => {
            let scenario = ScenarioConfig::from_file(path)?;
            if options.verbose_level > 0 {
                println!("シナリオファイル読み込み完了: {}", path.display());
            }
            scenario
        }
        None => {
            println!("シナリオ未指定のため、組み込みのデフォルトシナリオで実行します。");
            ScenarioConfig::default()
        }
    };

    if let Some(events) = options.events {
        scenario.run.events = events;
    }
    if let Some(seed) = options.seed {
        scenario.run.seed = seed;
    }
    scenario.validate()?;

    scenario.print_summary();
    println!();
    if options.info_only {
        return Ok(());
    }

    let summary_path = options.summary_path.clone().or_else(|| scenario.output.summary_file.clone());

    // シミュレーションエンジンの作成と初期化
    let mut simulation = SimulationEngine::new(scenario, options.verbose_level);
    simulation.initialize()?;

    // シミュレーション実行
    let summary = simulation.run()?;
    print_run_summary(&summary);

    if options.analyze {
        let tree = simulation
            .analysis()
            .and_then(|manager| manager.ntuple())
            .ok_or("イベントツリーがありません")?;
        let result = analysis::analyze(tree)?;
        print_offline_analysis(&result);
    }

    if let Some(path) = summary_path {
        write_summary(&path, &summary)?;
        info!("ランのまとめを書き出しました: {}", path.display());
    }

    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("=== ラン結果 ===");
    println!("処理イベント数: {}", summary.events);
    println!("dcin ヒット数: {} (棄却 {})", summary.dcin.hits_recorded, summary.dcin.rejected);
    println!("dcout ヒット数: {} (棄却 {})", summary.dcout.hits_recorded, summary.dcout.rejected);
    println!("欠損ヒットコレクション: {}", summary.missing_collections);
    println!("スキップした詰め込み: {}", summary.skipped_fills);
    println!("イベントツリー行数: {}", summary.analysis.ntuple_rows);
    for h in &summary.analysis.h1 {
        println!("  {:<28} entries = {:>8}  mean = {:.3}", h.name, h.entries, h.mean().unwrap_or(f64::NAN));
    }
}

fn print_offline_analysis(result: &OfflineAnalysis) {
    println!();
    println!("=== オフライン解析 ===");
    println!("解析イベント数: {}", result.processed);
    println!("選択イベント数 (20度 < θ < 60度): {}", result.selected);
    println!("dcout ヒットなし: {}", result.skipped);
    for name in result.histograms.h1_names() {
        if let Some(h) = result.histograms.h1(name) {
            println!("  {:<20} entries = {:>8}  mean = {:.3}", name, h.entries, h.mean().unwrap_or(f64::NAN));
        }
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_yaml::to_string(summary)?)?;
    Ok(())
}

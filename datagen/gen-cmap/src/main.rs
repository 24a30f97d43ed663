//! 为数据集中的每个受试者生成约束图.
//!
//! ```text
//! gen-cmap --data_dir /data/BraTS2020 --save_dir /data/cmaps --numCluster 20
//! ```

use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::process::ExitCode;

mod result;
mod runner;

/// 命令行参数.
#[derive(Parser, Debug, Clone)]
#[clap(name = "gen-cmap")]
#[clap(about = "Generate constraint maps from multi-contrast MR volumes")]
pub struct Args {
    /// 输入根目录, 每个受试者一个子目录.
    #[clap(long = "data_dir", env = "CMAP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// 输出根目录.
    #[clap(long = "save_dir", env = "CMAP_SAVE_DIR")]
    pub save_dir: Option<PathBuf>,

    /// 水平切片的目标边长.
    #[clap(long = "opShape", default_value_t = mr_cmap::consts::DEFAULT_OP_SHAPE)]
    pub op_shape: usize,

    /// K-means 聚类个数.
    #[clap(long = "numCluster", default_value_t = mr_cmap::consts::DEFAULT_NUM_CLUSTER)]
    pub num_cluster: usize,

    /// PCA 保留的主成分个数.
    #[clap(long = "numPC", default_value_t = mr_cmap::consts::DEFAULT_RETAINED_COMPONENTS)]
    pub num_pc: usize,

    /// 聚类随机种子.
    #[clap(long, default_value_t = mr_cmap::consts::DEFAULT_SEED)]
    pub seed: u64,

    /// TV 去噪权重.
    #[clap(long = "tvWeight", default_value_t = mr_cmap::consts::DEFAULT_TV_WEIGHT)]
    pub tv_weight: f32,

    /// 聚类前将背景体素的特征清零.
    #[clap(long = "mask_background")]
    pub mask_background: bool,

    /// 在每张约束图旁输出中间切片的 PNG 预览.
    #[clap(long)]
    pub preview: bool,
}

fn main() -> ExitCode {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .unwrap();

    let args = Args::parse();
    match runner::run(&args) {
        Ok(report) => {
            result::analyze(&report);
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

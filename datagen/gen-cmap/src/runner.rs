//! 程序运行函数.

use crate::Args;
use log::info;
use mr_cmap::prelude::*;

/// 由命令行参数构造批处理配置.
pub fn config_from(args: &Args) -> CmapResult<BatchConfig> {
    if args.op_shape == 0 {
        return Err(CmapError::Configuration(
            "--opShape must be positive".to_string(),
        ));
    }
    Ok(BatchConfig {
        assembler: Assembler::new(ContrastProtocol::brats(), (args.op_shape, args.op_shape)),
        cluster: ClusterParams {
            retained_components: args.num_pc,
            seed: args.seed,
            tv: TvParams::with_weight(args.tv_weight),
            mask_background: args.mask_background,
            ..ClusterParams::new(args.num_cluster)
        },
    })
}

/// 实际运行.
///
/// 缺少输入/输出目录时, 在处理任何受试者之前返回 [`CmapError::Configuration`].
pub fn run(args: &Args) -> CmapResult<BatchReport> {
    let data_dir = args.data_dir.as_ref().ok_or_else(|| {
        CmapError::Configuration("An input data directory must be provided".to_string())
    })?;
    let save_dir = args.save_dir.as_ref().ok_or_else(|| {
        CmapError::Configuration(
            "An output data directory must be provided to save constraint maps".to_string(),
        )
    })?;
    let config = config_from(args)?;
    let source = NiftiDirSource::new(data_dir)?;
    let sink = NpzDirSink::new(save_dir).with_preview(args.preview);

    info!(
        "Generating constraint maps with {} clusters: {} -> {}",
        config.cluster.num_cluster,
        data_dir.display(),
        save_dir.display()
    );
    run_batch(&source, &sink, &config)
}

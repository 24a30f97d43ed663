use std::collections::{BTreeSet, HashMap};
use std::fs::File;

use mr_cmap::consts::CONSTRAINT_MAP_FIELD;
use mr_cmap::prelude::*;
use ndarray::{s, Array3, ArrayView3, Ix3, OwnedRepr};
use ndarray_npy::NpzReader;

const SIDE: usize = 160;
const DEPTH: usize = 10;

/// 每个对比度四个象限的原始强度. 第 0 个对比度的第 0 象限为背景.
const QUADRANTS: [[f32; 4]; 4] = [
    [0.0, 30.0, 60.0, 90.0],
    [50.0, 10.0, 90.0, 30.0],
    [40.0, 80.0, 20.0, 60.0],
    [70.0, 20.0, 40.0, 100.0],
];

fn quadrant_volume(levels: [f32; 4]) -> ContrastVolume {
    Array3::from_shape_fn((SIDE, SIDE, DEPTH), |(i, j, _)| {
        let q = 2 * usize::from(i >= SIDE / 2) + usize::from(j >= SIDE / 2);
        levels[q]
    })
}

fn brats_subject(source: &mut InMemorySource, subject: &str) {
    let protocol = ContrastProtocol::brats();
    for (channel, levels) in protocol.iter().zip(QUADRANTS) {
        source.insert(subject, channel.name(), quadrant_volume(levels));
    }
}

fn read_labels(path: &std::path::Path) -> Array3<u32> {
    let mut npz = NpzReader::new(File::open(path).unwrap()).unwrap();
    let names = npz.names().unwrap();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with(CONSTRAINT_MAP_FIELD));
    npz.by_name::<OwnedRepr<u32>, Ix3>(&names[0]).unwrap()
}

/// 出现最多的标签及其占比.
fn majority(labels: ArrayView3<u32>) -> (u32, f64) {
    let mut counts = HashMap::new();
    for &l in labels.iter() {
        *counts.entry(l).or_insert(0usize) += 1;
    }
    let (&label, &count) = counts.iter().max_by_key(|(_, &c)| c).unwrap();
    (label, count as f64 / labels.len() as f64)
}

#[test]
fn test_end_to_end_quadrants() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init();

    let mut source = InMemorySource::new();
    brats_subject(&mut source, "BraTS20_Training_001");
    let out = tempfile::tempdir().unwrap();
    let sink = NpzDirSink::new(out.path());
    let config = BatchConfig {
        assembler: Assembler::new(ContrastProtocol::brats(), (SIDE, SIDE)),
        cluster: ClusterParams {
            retained_components: 4,
            seed: 0,
            ..ClusterParams::new(5)
        },
    };

    let report = run_batch(&source, &sink, &config).unwrap();
    assert!(report.is_clean(), "{:?}", report.outcomes());
    let artifact = out
        .path()
        .join("BraTS20_Training_001")
        .join("Constraint_map_5.npz");
    assert!(artifact.is_file());

    let labels = read_labels(&artifact);
    assert_eq!(labels.dim(), (SIDE, SIDE, DEPTH));
    let distinct: BTreeSet<u32> = labels.iter().copied().collect();
    assert!(distinct.len() <= 5);
    assert!(distinct.iter().all(|&l| l < 5));

    let margin = 20;
    let half = SIDE / 2;
    let mut seen = BTreeSet::new();
    for (r0, c0) in [(0, 0), (0, half), (half, 0), (half, half)] {
        let interior = labels.slice(s![
            r0 + margin..r0 + half - margin,
            c0 + margin..c0 + half - margin,
            ..
        ]);
        let (label, ratio) = majority(interior);
        assert!(ratio >= 0.9, "quadrant ({r0}, {c0}) is fragmented: {ratio}");
        seen.insert(label);
    }
    // 四个象限分属四个不同的类.
    assert_eq!(seen.len(), 4);
}

#[test]
fn test_batch_isolation() {
    let protocol = ContrastProtocol::new([("a", "_a.nii.gz"), ("b", "_b.nii.gz")]).unwrap();
    let volume = |scale: f32| {
        Array3::from_shape_fn((12, 12, 2), |(i, j, _)| {
            if i < 6 {
                0.0
            } else {
                scale * (1 + j) as f32
            }
        })
    };
    let mut source = InMemorySource::new();
    for subject in ["case1", "case2", "case3"] {
        source.insert(subject, "a", volume(1.0));
        if subject != "case2" {
            source.insert(subject, "b", volume(3.0));
        }
    }

    let out = tempfile::tempdir().unwrap();
    let sink = NpzDirSink::new(out.path());
    let config = BatchConfig {
        assembler: Assembler::new(protocol, (10, 10)),
        cluster: ClusterParams::new(3),
    };
    let report = run_batch(&source, &sink, &config).unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    let names: Vec<_> = report.outcomes().iter().map(|o| o.subject()).collect();
    assert_eq!(names, ["case1", "case2", "case3"]);
    assert_eq!(report.failures().next().unwrap().subject(), "case2");

    for subject in ["case1", "case3"] {
        let path = sink.artifact_path(subject, 3);
        assert!(path.is_file());
        let labels = read_labels(&path);
        assert_eq!(labels.dim(), (10, 10, 2));
        assert!(labels.iter().all(|&l| l < 3));
    }
    assert!(!sink.subject_dir("case2").exists());
}

use cindir_3d::mesh::reconstruction::create_sphere_point_cloud;
use cindir_3d::{poisson_reconstruction, quantile, remove_low_density_vertices, PoissonConfig};
use cindir_core::{Error, PointCloud};
use cindir_io::{write_point_cloud_file, PlyEncoding};
use cindir_pipeline::{PointCloudPipeline, ProcessingMetadata, Stage, StageOutcome};
use cindir_point_cloud::{
    estimate_normals, NormalEstimationConfig, StatisticalOutlierConfig, VoxelDownsampleConfig,
};
use nalgebra::Point3;
use std::path::{Path, PathBuf};

const TS: &str = "20240615_101500";

fn sphere_file(dir: &Path) -> PathBuf {
    let path = dir.join("sphere.ply");
    let cloud = create_sphere_point_cloud(Point3::new(1.0, 2.0, 3.0), 1.0, 1500);
    write_point_cloud_file(&path, &cloud, PlyEncoding::BinaryLittleEndian).unwrap();
    path
}

fn xyz_file(dir: &Path) -> PathBuf {
    let path = dir.join("grid.xyz");
    let mut text = String::new();
    for x in 0..10 {
        for y in 0..10 {
            text.push_str(&format!("{} {} 0\n", x as f64 * 0.1, y as f64 * 0.1));
        }
    }
    std::fs::write(&path, text).unwrap();
    path
}

fn read_metadata(path: &Path) -> ProcessingMetadata {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_full_run_writes_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = PointCloudPipeline::new();

    assert_eq!(
        pipeline.load(sphere_file(dir.path())).unwrap(),
        StageOutcome::Loaded { points: 1500 }
    );
    pipeline
        .run_stage(&Stage::RemoveOutliers(StatisticalOutlierConfig::default()))
        .unwrap();
    let outcome = pipeline
        .run_stage(&Stage::ReconstructMesh {
            poisson: PoissonConfig {
                depth: 5,
                ..PoissonConfig::default()
            },
            density_quantile: 0.1,
        })
        .unwrap();
    let StageOutcome::MeshReconstructed { vertices, faces, .. } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(vertices > 0 && faces > 0);

    let out = dir.path().join("out");
    let report = pipeline.persist_with_timestamp(&out, TS).unwrap();
    assert_eq!(report.cloud_path, Some(out.join(format!("processed_cloud_{TS}.ply"))));
    assert_eq!(report.mesh_path, Some(out.join(format!("mesh_{TS}.ply"))));
    assert_eq!(report.metadata_path, out.join(format!("metadata_{TS}.json")));

    let meta = read_metadata(&report.metadata_path);
    assert_eq!(meta.processing_date, TS);
    assert_eq!(meta.original_points, 1500);
    assert_eq!(meta.final_points, pipeline.cloud().unwrap().len());
    assert_eq!(meta.mesh_vertices, vertices);
    assert_eq!(meta.mesh_faces, faces);

    let reloaded = cindir_io::read_point_cloud(report.cloud_path.unwrap()).unwrap();
    assert_eq!(reloaded.len(), meta.final_points);
}

fn sphere_distance(v: &Point3<f64>, center: &Point3<f64>) -> f64 {
    ((v - center).norm() - 1.0).abs()
}

#[test]
fn test_pruning_trims_extrapolated_vertices_with_estimated_normals() {
    let center = Point3::new(1.0, 2.0, 3.0);
    let mut cloud = create_sphere_point_cloud(center, 1.0, 3000);
    cloud.normals = None;
    let normals = NormalEstimationConfig {
        radius: 0.2,
        max_nn: 30,
    };
    estimate_normals(&mut cloud, &normals).unwrap();

    let poisson = PoissonConfig {
        depth: 5,
        ..PoissonConfig::default()
    };
    let mut mesh = poisson_reconstruction(&cloud, &poisson).unwrap();
    let densities = mesh.densities.clone().unwrap();
    assert!(densities.iter().all(|&d| d > 0.0));

    let threshold = quantile(&densities, 0.1).unwrap();
    let (mut removed, mut kept) = (Vec::new(), Vec::new());
    for (v, &d) in mesh.vertices.iter().zip(&densities) {
        let dist = sphere_distance(v, &center);
        if d < threshold {
            removed.push(dist);
        } else {
            kept.push(dist);
        }
    }
    assert!(!removed.is_empty());
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    assert!(
        mean(&removed) > mean(&kept),
        "removed {} kept {}",
        mean(&removed),
        mean(&kept)
    );

    let pruned = remove_low_density_vertices(&mut mesh, 0.1).unwrap();
    assert_eq!(pruned, removed.len());
    assert!(mesh.validate().is_ok());

    // Same run through the pipeline stages.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare_sphere.ply");
    let mut bare = create_sphere_point_cloud(center, 1.0, 3000);
    bare.normals = None;
    write_point_cloud_file(&path, &bare, PlyEncoding::BinaryLittleEndian).unwrap();

    let mut pipeline = PointCloudPipeline::new();
    pipeline.load(&path).unwrap();
    pipeline.run_stage(&Stage::EstimateNormals(normals)).unwrap();
    let outcome = pipeline
        .run_stage(&Stage::ReconstructMesh {
            poisson,
            density_quantile: 0.1,
        })
        .unwrap();
    let StageOutcome::MeshReconstructed {
        pruned_vertices, ..
    } = outcome
    else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(pruned_vertices > 0);
}

#[test]
fn test_mesh_needs_normals() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = PointCloudPipeline::new();
    pipeline.load(xyz_file(dir.path())).unwrap();

    let err = pipeline
        .reconstruct_mesh(&PoissonConfig::default(), 0.1)
        .unwrap_err();
    assert!(matches!(err, Error::MissingPrerequisite { .. }));
    assert!(pipeline.mesh().is_none());
}

#[test]
fn test_failed_stage_leaves_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = PointCloudPipeline::new();
    pipeline.load(xyz_file(dir.path())).unwrap();
    let before: PointCloud = pipeline.cloud().unwrap().clone();

    let bad = Stage::Downsample(VoxelDownsampleConfig { voxel_size: 0.0 });
    assert!(matches!(
        pipeline.run_stage(&bad),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(pipeline.cloud(), Some(&before));
}

#[test]
fn test_downsample_updates_final_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = PointCloudPipeline::new().with_ply_encoding(PlyEncoding::Ascii);
    pipeline.load(xyz_file(dir.path())).unwrap();

    let outcome = pipeline
        .downsample(&VoxelDownsampleConfig { voxel_size: 10.0 })
        .unwrap();
    assert_eq!(outcome, StageOutcome::Downsampled { before: 100, after: 1 });

    let report = pipeline.persist_with_timestamp(dir.path().join("out"), TS).unwrap();
    let meta = read_metadata(&report.metadata_path);
    assert_eq!((meta.original_points, meta.final_points), (100, 1));
    assert!(report.mesh_path.is_none());
}

#[test]
fn test_persist_with_nothing_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PointCloudPipeline::new();
    let report = pipeline.persist(dir.path()).unwrap();

    assert_eq!(report.timestamp.len(), "YYYYMMDD_HHMMSS".len());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    let meta = read_metadata(&report.metadata_path);
    assert_eq!(
        (meta.original_points, meta.final_points, meta.mesh_vertices, meta.mesh_faces),
        (0, 0, 0, 0)
    );
}

#[test]
fn test_reload_clears_mesh_and_reset_clears_all() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = PointCloudPipeline::new();
    pipeline.load(sphere_file(dir.path())).unwrap();
    pipeline
        .reconstruct_mesh(
            &PoissonConfig {
                depth: 4,
                ..PoissonConfig::default()
            },
            0.1,
        )
        .unwrap();
    assert!(pipeline.mesh().is_some());

    pipeline.load(xyz_file(dir.path())).unwrap();
    assert!(pipeline.mesh().is_none());
    assert_eq!(pipeline.original_point_count(), 100);

    pipeline.reset();
    assert!(pipeline.cloud().is_none());
    assert_eq!(pipeline.original_point_count(), 0);
}

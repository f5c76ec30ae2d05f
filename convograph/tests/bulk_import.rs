//! CSV bulk import through the batch loader.

mod helpers;

use convograph::config::LoaderSettings;
use convograph::loader::BatchLoader;
use helpers::memory_manager;

fn write(dir: &std::path::Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).expect("write csv");
}

#[tokio::test]
async fn test_import_directory_is_idempotent_per_job() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "nodes.csv",
        "text,type,confidence\nAlice,Person,0.9\nBob,Person,\nAcme,Org,1\n",
    );
    write(
        dir.path(),
        "relations.csv",
        "source,relation,target\nAlice,works_at,Acme\nAlice,works_at,Acme\nBob,knows,Carol\n",
    );
    write(
        dir.path(),
        "concepts.csv",
        "name,description,category\nEmployment,Having a job,\n",
    );

    let manager = memory_manager(true).await;
    let loader = BatchLoader::new(
        manager,
        &LoaderSettings {
            batch_size: 2,
            concurrency: 2,
        },
    );

    let report = loader.load_directory(dir.path(), "job-7").await.unwrap();
    assert_eq!(report.nodes_loaded, 3);
    assert_eq!(report.concepts_loaded, 1);
    // The duplicate row shares a chunk with its twin; Carol was never imported.
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.relationships_loaded, 1);

    loader.load_directory(dir.path(), "job-7").await.unwrap();
    let stats = loader.job_statistics("job-7").await;
    assert_eq!(
        (stats.nodes, stats.relationships, stats.concepts),
        (3, 1, 1)
    );

    let deleted = loader.delete_job_data("job-7").await.unwrap();
    assert_eq!(deleted, 5);
    assert_eq!(loader.job_statistics("job-7").await.nodes, 0);
}

#[tokio::test]
async fn test_missing_directory_is_rejected() {
    let manager = memory_manager(true).await;
    let loader = BatchLoader::new(manager, &LoaderSettings::default());
    let missing = std::path::Path::new("/definitely/not/here");
    assert!(loader.load_directory(missing, "job").await.is_err());
}

#[tokio::test]
async fn test_disconnected_storage_refuses_import() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "entity.csv", "name\nAlice\n");

    let manager = memory_manager(false).await;
    let loader = BatchLoader::new(manager, &LoaderSettings::default());
    let err = loader.load_directory(dir.path(), "job").await.unwrap_err();
    assert!(matches!(
        err,
        convograph::ConvographError::StorageUnavailable(_)
    ));
}

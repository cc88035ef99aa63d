//! Integration tests for ClassificationEngine against a real filesystem
//!
//! These tests verify:
//! - Moves into category directories, created on demand
//! - Collision-safe naming, also for concurrent moves
//! - Skips leaving files in place
//! - Origin nesting with placeholder-expanded listen directories

use autoclassify::services::{ClassifyOutcome, SkipReason, unique_destination};
use autoclassify::{ClassificationEngine, PathPlaceholders, TransferConfig, TransferError};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;
use std::sync::Barrier;
use std::thread;
use tempfile::TempDir;

struct Sandbox {
    _temp: TempDir,
    inbox: Utf8PathBuf,
    out: Utf8PathBuf,
}

fn sandbox() -> Sandbox {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
    let inbox = root.join("in");
    fs::create_dir(&inbox).unwrap();
    Sandbox {
        _temp: temp,
        inbox,
        out: root.join("out"),
    }
}

fn config(out: &Utf8Path) -> TransferConfig {
    let mut suffix_rules = IndexMap::new();
    suffix_rules.insert("图片".to_string(), vec!["jpg".to_string(), "png".to_string()]);
    suffix_rules.insert("文档".to_string(), vec!["txt".to_string()]);
    TransferConfig {
        classify_directory: out.to_path_buf(),
        sub_app: false,
        suffix_rules,
        ..TransferConfig::default()
    }
}

fn touch(path: &Utf8Path) {
    fs::write(path, path.as_str()).unwrap();
}

#[test]
fn test_photo_scenario() {
    let sb = sandbox();
    let engine = ClassificationEngine::default();
    let config = config(&sb.out);

    let photo = sb.inbox.join("photo.JPG");
    let data = sb.inbox.join("data");
    touch(&photo);
    touch(&data);

    let moved = engine.classify(&photo, &config).unwrap();
    let skipped = engine.classify(&data, &config).unwrap();

    assert_eq!(
        moved,
        ClassifyOutcome::Moved {
            category: "图片".to_string(),
            destination: sb.out.join("图片/photo.JPG"),
        }
    );
    assert!(sb.out.join("图片/photo.JPG").is_file());
    assert!(!photo.exists());

    assert_eq!(skipped, ClassifyOutcome::Skipped(SkipReason::NoSuffix));
    assert!(data.is_file());
}

#[test]
fn test_collision_safe_move() {
    let sb = sandbox();
    let engine = ClassificationEngine::default();
    let config = config(&sb.out);

    fs::create_dir_all(sb.out.join("文档")).unwrap();
    touch(&sb.out.join("文档/a.txt"));

    let source = sb.inbox.join("a.txt");
    touch(&source);
    let outcome = engine.classify(&source, &config).unwrap();

    assert_eq!(
        outcome,
        ClassifyOutcome::Moved {
            category: "文档".to_string(),
            destination: sb.out.join("文档/a_1.txt"),
        }
    );
    // The existing file is untouched
    assert_eq!(
        fs::read_to_string(sb.out.join("文档/a.txt")).unwrap(),
        sb.out.join("文档/a.txt").as_str()
    );

    touch(&source);
    engine.classify(&source, &config).unwrap();
    assert!(sb.out.join("文档/a_2.txt").is_file());
}

#[test]
fn test_unique_destination_without_extension() {
    let sb = sandbox();
    touch(&sb.inbox.join("notes"));
    assert_eq!(
        unique_destination(&sb.inbox, "notes"),
        sb.inbox.join("notes_1")
    );
    assert_eq!(
        unique_destination(&sb.inbox, "fresh.txt"),
        sb.inbox.join("fresh.txt")
    );

    // A trailing dot is not an extension
    touch(&sb.inbox.join("trailing."));
    assert_eq!(
        unique_destination(&sb.inbox, "trailing."),
        sb.inbox.join("trailing_1")
    );
}

#[test]
fn test_concurrent_same_name_moves_keep_both_files() {
    for _ in 0..100 {
        let sb = sandbox();
        let engine = ClassificationEngine::default();
        let config = config(&sb.out);

        let sources: Vec<Utf8PathBuf> = (0..2)
            .map(|i| {
                let dir = sb.inbox.join(format!("in{i}"));
                fs::create_dir(&dir).unwrap();
                let source = dir.join("a.txt");
                touch(&source);
                source
            })
            .collect();

        let barrier = Barrier::new(sources.len());
        thread::scope(|scope| {
            for source in &sources {
                let (engine, config, barrier) = (engine.clone(), &config, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    engine.classify(source, config).unwrap();
                });
            }
        });

        let mut landed: Vec<String> = fs::read_dir(sb.out.join("文档"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        landed.sort();
        assert_eq!(landed, vec!["a.txt".to_string(), "a_1.txt".to_string()]);
    }
}

#[test]
fn test_vanished_source_is_noop() {
    let sb = sandbox();
    let engine = ClassificationEngine::default();

    let outcome = engine
        .classify(&sb.inbox.join("gone.jpg"), &config(&sb.out))
        .unwrap();

    assert_eq!(outcome, ClassifyOutcome::SourceMissing);
    assert!(!sb.out.exists());
}

#[test]
fn test_ignored_file_stays() {
    let sb = sandbox();
    let engine = ClassificationEngine::default();
    let source = sb.inbox.join("movie.mp4.aria");
    touch(&source);

    let outcome = engine.classify(&source, &config(&sb.out)).unwrap();

    assert_eq!(
        outcome,
        ClassifyOutcome::Skipped(SkipReason::Ignored("aria".to_string()))
    );
    assert!(source.exists());
}

#[test]
fn test_target_occupied_by_file() {
    let sb = sandbox();
    let engine = ClassificationEngine::default();
    fs::create_dir_all(&sb.out).unwrap();
    touch(&sb.out.join("图片"));

    let source = sb.inbox.join("x.png");
    touch(&source);
    let result = engine.classify(&source, &config(&sb.out));

    assert!(matches!(result, Err(TransferError::Storage { .. })));
    assert!(source.exists());
}

#[test]
fn test_origin_nesting_with_placeholders() {
    let sb = sandbox();
    let root = sb.inbox.parent().unwrap().to_path_buf();
    let engine = ClassificationEngine::new(PathPlaceholders::new().with("storage", root.as_str()));

    let mut config = config(&sb.out);
    config.sub_app = true;
    config
        .listen_directories
        .insert("收件箱".to_string(), vec!["{storage}/in".to_string()]);

    // A sibling whose name merely starts with the listen path is not inside it
    let sibling = root.join("inbox-other");
    fs::create_dir(&sibling).unwrap();

    let inside = sb.inbox.join("pic.png");
    let outside = sibling.join("pic.png");
    touch(&inside);
    touch(&outside);

    engine.classify(&inside, &config).unwrap();
    engine.classify(&outside, &config).unwrap();

    assert!(sb.out.join("收件箱/图片/pic.png").is_file());
    assert!(sb.out.join("图片/pic.png").is_file());
}

//! Music catalog tests

use murmur::Error;
use murmur::music::MusicPlayer;

mod common;

use common::MemorySink;

fn player_with(files: &[&str]) -> (MusicPlayer, MemorySink, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        let path = dir.path().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }

    let sink = MemorySink::default();
    let player = MusicPlayer::new(dir.path().to_path_buf(), Box::new(sink.clone()));
    (player, sink, dir)
}

#[test]
fn test_scan_is_sorted_recursive_and_filtered() {
    let (mut player, _sink, _dir) =
        player_with(&["b.mp3", "a.wav", "cover.jpg", "live/c.MP3", "notes.txt"]);

    assert_eq!(player.scan().unwrap(), 3);

    let titles: Vec<&str> = player.tracks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
}

#[test]
fn test_scan_creates_missing_folder() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("Music");
    let mut player = MusicPlayer::new(folder.clone(), Box::new(MemorySink::default()));

    assert_eq!(player.scan().unwrap(), 0);
    assert!(folder.is_dir());
}

#[test]
fn test_next_and_previous_wrap() {
    let (mut player, sink, _dir) = player_with(&["alpha.mp3", "beta.mp3", "gamma.mp3"]);
    player.scan().unwrap();

    assert_eq!(player.next().unwrap(), "beta");
    assert_eq!(player.index(), 1);
    assert_eq!(player.next().unwrap(), "gamma");
    assert_eq!(player.next().unwrap(), "alpha");
    assert_eq!(player.index(), 0);

    assert_eq!(player.previous().unwrap(), "gamma");
    assert_eq!(player.index(), 2);

    assert_eq!(
        *sink.events.lock().unwrap(),
        vec![
            "play beta.mp3",
            "play gamma.mp3",
            "play alpha.mp3",
            "play gamma.mp3"
        ]
    );
}

#[test]
fn test_empty_catalog_refuses_playback() {
    let (mut player, sink, _dir) = player_with(&[]);
    player.scan().unwrap();

    assert!(matches!(player.play(), Err(Error::EmptyCatalog)));
    assert!(matches!(player.next(), Err(Error::EmptyCatalog)));
    assert!(matches!(player.previous(), Err(Error::EmptyCatalog)));
    assert_eq!(player.current_title(), None);
    assert!(sink.events.lock().unwrap().is_empty());
}

#[test]
fn test_rescan_resets_cursor() {
    let (mut player, _sink, dir) = player_with(&["one.mp3", "two.mp3"]);
    player.scan().unwrap();
    player.next().unwrap();
    assert_eq!(player.current_title(), Some("two"));

    std::fs::write(dir.path().join("zero.mp3"), b"").unwrap();
    assert_eq!(player.scan().unwrap(), 3);
    assert_eq!(player.index(), 0);
    assert_eq!(player.current_title(), Some("one"));
}

#[test]
fn test_transport_controls_reach_sink() {
    let (mut player, sink, _dir) = player_with(&["song.wav"]);
    player.scan().unwrap();

    player.play().unwrap();
    player.pause();
    player.resume();
    player.stop();

    assert_eq!(
        *sink.events.lock().unwrap(),
        vec!["play song.wav", "pause", "resume", "stop"]
    );
}

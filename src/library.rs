use crate::model::Track;
use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

#[derive(Default)]
struct TrackMetadata {
    title: Option<String>,
    genre: Option<String>,
    duration: Option<f64>,
}

/// Builds tracks for every audio file under `root`, sorted by path.
pub fn scan_folder(root: &Path) -> Vec<Track> {
    let mut tracks = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio(path) {
            continue;
        }
        tracks.push(track_for_path(path));
    }

    tracks.sort_by(|a, b| a.source.cmp(&b.source));
    tracks
}

/// Scans every root in order. A track reachable from several roots is kept once,
/// at its first position.
pub fn scan_many(roots: &[PathBuf]) -> Vec<Track> {
    let mut all = Vec::new();
    for root in roots {
        if root.is_file() {
            if is_audio(root) {
                all.push(track_for_path(root));
            }
            continue;
        }
        all.extend(scan_folder(root));
    }
    let mut seen = HashSet::new();
    all.retain(|track| seen.insert(track.id.clone()));
    all
}

pub fn track_for_path(path: &Path) -> Track {
    let metadata = metadata_for(path);
    let title = metadata
        .title
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or("unknown")
                .to_string()
        });
    let source = path.to_string_lossy().to_string();

    Track {
        id: source.clone(),
        title,
        category: metadata.genre.unwrap_or_default(),
        source,
        duration: metadata.duration,
        play_count: 0,
    }
}

fn metadata_for(path: &Path) -> TrackMetadata {
    let Ok(tagged) = Probe::open(path).and_then(|probe| probe.read()) else {
        log::debug!("no readable tags in {}", path.display());
        return TrackMetadata::default();
    };

    let duration = tagged.properties().duration();
    let mut metadata = TrackMetadata {
        duration: (!duration.is_zero()).then(|| duration.as_secs_f64()),
        ..TrackMetadata::default()
    };

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        metadata.title = tag.title().map(|value| value.trim().to_string());
        metadata.genre = tag
            .genre()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }
    metadata
}

fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scan_picks_audio_files_only() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("calm");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(dir.path().join("b-breath.mp3"), b"").expect("write");
        fs::write(nested.join("a-rain.FLAC"), b"").expect("write");
        fs::write(dir.path().join("notes.txt"), b"").expect("write");

        let tracks = scan_folder(dir.path());
        let titles: Vec<&str> = tracks.iter().map(|track| track.title.as_str()).collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"b-breath"));
        assert!(titles.contains(&"a-rain"));
        assert!(tracks.iter().all(|track| track.duration.is_none()));
    }

    #[test]
    fn overlapping_roots_yield_each_track_once() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("a-ocean.mp3");
        fs::write(&first, b"").expect("write");
        fs::write(dir.path().join("b-forest.mp3"), b"").expect("write");

        let tracks = scan_many(&[dir.path().to_path_buf(), first.clone(), dir.path().to_path_buf()]);
        let ids: Vec<&str> = tracks.iter().map(|track| track.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], first.to_string_lossy());
        assert!(ids[1].ends_with("b-forest.mp3"));
    }

    #[test]
    fn track_id_is_its_source() {
        let track = track_for_path(Path::new("/music/ocean.ogg"));
        assert_eq!(track.id, "/music/ocean.ogg");
        assert_eq!(track.source, track.id);
        assert_eq!(track.title, "ocean");
    }
}

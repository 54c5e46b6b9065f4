// Audio ingestion for the processing pipeline
// Retrieves the uploaded recording and probes its container metadata

use log::{debug, warn};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::PipelineError;

/// Download the uploaded audio into memory.
///
/// The upload layer has already bounded the file size, so no limit is
/// enforced here. Any transport error or non-success status fails the
/// whole pipeline.
pub async fn fetch_audio(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, PipelineError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::Fetch(format!("request to {} failed: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(PipelineError::Fetch(format!(
            "audio fetch returned {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::Fetch(format!("failed to read audio body: {}", e)))?;

    Ok(bytes.to_vec())
}

/// Best-effort duration from the audio container's metadata.
///
/// Returns 0 when the duration cannot be determined; an unreadable
/// container never fails the pipeline.
pub fn probe_duration_seconds(bytes: &[u8]) -> u64 {
    let source = Box::new(std::io::Cursor::new(bytes.to_vec()));
    let stream = MediaSourceStream::new(source, Default::default());

    let probed = match symphonia::default::get_probe().format(
        &Hint::new(),
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(e) => {
            warn!("Could not probe audio container: {}", e);
            return 0;
        }
    };

    let track = match probed.format.default_track() {
        Some(track) => track,
        None => {
            warn!("Audio container has no default track");
            return 0;
        }
    };

    match (track.codec_params.time_base, track.codec_params.n_frames) {
        (Some(time_base), Some(n_frames)) => {
            let time = time_base.calc_time(n_frames);
            let seconds = time.seconds + if time.frac >= 0.5 { 1 } else { 0 };
            debug!("Probed audio duration: {} seconds", seconds);
            seconds
        }
        _ => {
            warn!("Audio container metadata carries no duration");
            0
        }
    }
}

/// Minimal PCM WAV container of the given length, for probe tests
#[cfg(test)]
pub(crate) fn wav_bytes(seconds: u32) -> Vec<u8> {
    let sample_rate: u32 = 8000;
    let data_len = sample_rate * seconds * 2; // mono, 16-bit

    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_audio_returns_body_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _audio = server
            .mock("GET", "/recordings/m1.mp3")
            .with_status(200)
            .with_header("content-type", "audio/mpeg")
            .with_body("pretend audio")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/recordings/m1.mp3", server.url());

        let bytes = fetch_audio(&client, &url).await.unwrap();
        assert_eq!(bytes, b"pretend audio");
    }

    #[tokio::test]
    async fn test_fetch_audio_fails_on_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/recordings/gone.mp3")
            .with_status(404)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/recordings/gone.mp3", server.url());

        let err = fetch_audio(&client, &url).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(_)));
        assert_eq!(err.stage(), "fetch");
    }

    #[test]
    fn test_probe_duration_of_wav() {
        assert_eq!(probe_duration_seconds(&wav_bytes(2)), 2);
        assert_eq!(probe_duration_seconds(&wav_bytes(90)), 90);
    }

    #[test]
    fn test_probe_duration_of_garbage_is_zero() {
        assert_eq!(probe_duration_seconds(b"definitely not audio"), 0);
        assert_eq!(probe_duration_seconds(&[]), 0);
    }
}

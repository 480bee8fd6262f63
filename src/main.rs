use clap::Parser;
use speakerline::audio::{NeuralVad, VadBackend};
use speakerline::config::{Cli, DeviceHint, EngineConfig, ENV_HF_TOKEN, ENV_MODEL_DIR, ENV_MODEL_URL};
use speakerline::embedding::{EmbeddingError, EmbeddingExtractor, SignalFeatureEmbeddingExtractor};
use speakerline::output::{JsonlWriter, OutputRecord};
use speakerline::session::Session;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const EXIT_OK: i32 = 0;
const EXIT_RUNTIME_ERROR: i32 = 1;
const EXIT_MISUSE: i32 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = run().await;
    std::process::exit(code);
}

async fn run() -> i32 {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let input = cli.input.clone();
    let config = match EngineConfig::try_from(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("speakerline: {err}");
            return EXIT_MISUSE;
        }
    };

    let session_id = Uuid::new_v4().to_string();
    let stdout = io::stdout();
    let mut writer = JsonlWriter::new(stdout.lock());

    let mut diarization_unavailable: Option<(String, String)> = None;
    let embedding_extractor: Option<Box<dyn EmbeddingExtractor>> = if config.diarization_enabled {
        match resolve_embedding_extractor().await {
            Ok(extractor) => Some(extractor),
            Err((reason, details)) => {
                diarization_unavailable = Some((reason, details));
                None
            }
        }
    } else {
        None
    };

    let neural_vad: Option<Box<dyn VadBackend + Send>> =
        if config.vad_enabled { Some(Box::new(NeuralVad::default())) } else { None };

    let mut session = match Session::new(&config, embedding_extractor, neural_vad) {
        Ok(session) => session,
        Err(err) => {
            let _ = writer.write_record(&OutputRecord::Error {
                message: err.to_string(),
                code: "session_init_failed".to_string(),
            });
            return EXIT_RUNTIME_ERROR;
        }
    };

    let backend = match config.device {
        DeviceHint::Cpu => "cpu",
        DeviceHint::Cuda => "cuda",
    };
    if writer
        .write_record(&OutputRecord::Ready {
            session_id,
            backend: backend.to_string(),
            sample_rate: config.sample_rate,
            chunk_duration: config.chunk_duration_seconds,
            vad_enabled: config.vad_enabled,
            diarization_enabled: config.diarization_enabled,
        })
        .is_err()
    {
        return EXIT_RUNTIME_ERROR;
    }

    if let Some((reason, details)) = diarization_unavailable {
        if writer
            .write_record(&OutputRecord::DiarizationUnavailable {
                reason,
                details,
                capabilities: vec!["segment".to_string(), "status".to_string()],
            })
            .is_err()
        {
            return EXIT_RUNTIME_ERROR;
        }
    }

    let result = if input == "-" {
        run_stdin_loop(&mut session, &mut writer).await
    } else {
        run_file_loop(&input, &mut session, &mut writer).await
    };

    match result {
        Ok(()) => EXIT_OK,
        Err(err) => {
            let _ = writer.write_record(&OutputRecord::Error {
                message: err.to_string(),
                code: "runtime_error".to_string(),
            });
            EXIT_RUNTIME_ERROR
        }
    }
}

/// The cooperative loop's two suspension points: reading the next chunk of
/// input bytes, and (elsewhere, inside `Session`) calling into the blocking
/// embedding extractor. Everything else runs synchronously between them.
async fn run_stdin_loop(session: &mut Session, writer: &mut JsonlWriter<impl io::Write>) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut handle = stdin.lock();
    let mut buf = [0u8; 32 * 1024];

    loop {
        let n = handle.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for record in session.ingest_bytes(&buf[..n]) {
            writer.write_record(&record)?;
        }
    }

    for record in session.finish() {
        writer.write_record(&record)?;
    }
    Ok(())
}

async fn run_file_loop(path: &str, session: &mut Session, writer: &mut JsonlWriter<impl io::Write>) -> anyhow::Result<()> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; 32 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for record in session.ingest_bytes(&buf[..n]) {
            writer.write_record(&record)?;
        }
    }

    for record in session.finish() {
        writer.write_record(&record)?;
    }
    Ok(())
}

async fn resolve_embedding_extractor() -> Result<Box<dyn EmbeddingExtractor>, (String, String)> {
    #[cfg(feature = "neural")]
    {
        // Only take the gated neural path when the caller explicitly points
        // at a bundled model directory; absent that, `default_cache_dir`
        // exists for a future explicit "use neural" flag but must not turn
        // every default run into an authentication failure.
        let model_dir = std::env::var(ENV_MODEL_DIR).ok().map(std::path::PathBuf::from);

        if let Some(model_dir) = model_dir {
            let model_path = model_dir.join("embedding.onnx");

            #[cfg(feature = "model-download")]
            if !model_path.exists() {
                if let (Ok(url), Ok(token)) = (std::env::var(ENV_MODEL_URL), std::env::var(ENV_HF_TOKEN)) {
                    match speakerline::embedding::download_model(&url, &model_path, &token).await {
                        Ok(bytes) => tracing::info!(bytes, "downloaded embedding model"),
                        Err(err) => tracing::warn!(error = %err, "embedding model download failed, falling back"),
                    }
                }
            }

            if model_path.exists() {
                match speakerline::embedding::OnnxEmbeddingExtractor::load(&model_path) {
                    Ok(extractor) => return Ok(Box::new(extractor)),
                    Err(err) => {
                        tracing::warn!(error = %err, "bundled embedding model failed to load, falling back");
                    }
                }
            } else if std::env::var(ENV_HF_TOKEN).is_err() {
                let err = EmbeddingError::AuthenticationRequired(format!(
                    "no bundled model at {} and {ENV_HF_TOKEN} is not set",
                    model_dir.display()
                ));
                return Err(("authentication_required".to_string(), err.to_string()));
            }
        }
    }

    Ok(Box::new(SignalFeatureEmbeddingExtractor::default()))
}

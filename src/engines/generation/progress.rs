use super::evolution_engine::GenerationRecord;
use std::sync::mpsc::Sender;

pub trait ProgressCallback: Send {
    /// `generation` is 1-based.
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, record: &GenerationRecord);
    fn on_candidate_evaluated(&mut self, evaluated: usize, total: usize);
}

/// Discards all progress.
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_generation_start(&mut self, _generation: usize) {}
    fn on_generation_complete(&mut self, _record: &GenerationRecord) {}
    fn on_candidate_evaluated(&mut self, _evaluated: usize, _total: usize) {}
}

pub struct LoggingProgressCallback;

impl ProgressCallback for LoggingProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::info!("Generation {} starting...", generation);
    }

    fn on_generation_complete(&mut self, record: &GenerationRecord) {
        log::info!(
            "Generation {} complete. Best score: {}, run best: {}, diversity: {:.3}, evaluated {} (failed {}, timed out {}, cached {})",
            record.generation,
            record
                .best_fitness
                .map_or_else(|| "n/a".to_string(), |f| format!("{:.4}", f.score)),
            record
                .run_best_fitness
                .map_or_else(|| "n/a".to_string(), |f| format!("{:.4}", f.score)),
            record.diversity,
            record.evaluated,
            record.failed,
            record.timed_out,
            record.cache_hits
        );
    }

    fn on_candidate_evaluated(&mut self, evaluated: usize, total: usize) {
        if evaluated % 10 == 0 || evaluated == total {
            log::debug!("  Evaluated {}/{} candidates", evaluated, total);
        }
    }
}

/// For hosts that consume progress on another thread
#[derive(Debug, Clone)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete(Box<GenerationRecord>),
    CandidateEvaluated { evaluated: usize, total: usize },
}

pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, record: &GenerationRecord) {
        let _ = self
            .sender
            .send(ProgressMessage::GenerationComplete(Box::new(record.clone())));
    }

    fn on_candidate_evaluated(&mut self, evaluated: usize, total: usize) {
        let _ = self
            .sender
            .send(ProgressMessage::CandidateEvaluated { evaluated, total });
    }
}

use async_stream::stream;
use futures::stream::Stream;
use futures::stream::StreamExt;
use modeldb::prelude::*;
use modeldb::{VectorChange, VectorChangeType};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DOC_PATH: &str = "stress/shared.json";

/// Statistics collected during a stress run
#[derive(Clone, Debug)]
pub struct StressTestStats {
    pub num_participants: usize,
    pub operations_per_participant: usize,
    pub total_syncs: usize,
    pub relayed_mutations: usize,
    pub total_time: Duration,
    pub avg_sync_time: Duration,
    pub ops_per_second: f64,
    pub converged: bool,
}

impl StressTestStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Stress Test Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Participants:              {:>38} ║", self.num_participants);
        println!("║  Operations/Participant:    {:>38} ║", self.operations_per_participant);
        println!("║  Sync Rounds:               {:>38} ║", self.total_syncs);
        println!("║  Relayed Mutations:         {:>38} ║", self.relayed_mutations);
        println!("║  Total Time:                {:>39}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Average Sync Time:         {:>36}µs ║", format!("{:.2}", self.avg_sync_time.as_micros()));
        println!("║  Operations/Second:         {:>38.0} ║", self.ops_per_second);
        println!("║  Converged:                 {:>38} ║", if self.converged { "yes" } else { "NO" });
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

enum Step {
    Edit(usize),
    Sync,
}

/// Yields which participant edits next, with a relay every `sync_every` edits
fn edit_schedule(num_participants: usize, num_edits: usize, sync_every: usize) -> impl Stream<Item = Step> {
    stream! {
        let mut rng = StdRng::from_entropy();
        for i in 0..num_edits {
            yield Step::Edit(rng.gen_range(0..num_participants));
            if sync_every > 0 && (i + 1) % sync_every == 0 {
                yield Step::Sync;
            }
        }
        yield Step::Sync;
    }
}

/// One user with a store and a container of each kind
struct Participant {
    name: String,
    store: PathStore,
    todos: RemoteVector,
    title: RemoteString,
    meta: RemoteMap,
    /// Rebuilt from `todos` change events only.
    mirror: Arc<Mutex<Vec<Value>>>,
}

impl Participant {
    async fn join(drive: &MemoryDrive, idx: usize) -> Result<Self> {
        let name = format!("participant_{}", idx);
        let store = PathStore::new(
            StoreOptions::builder(DOC_PATH)
                .backend(drive.session(name.clone()))
                .build(),
        )?;
        let todos = store.create_vector("todos")?;
        let title = store.create_string("title")?;
        let meta = store.create_map("meta")?;

        let mirror = Arc::new(Mutex::new(Vec::new()));
        let m = Arc::clone(&mirror);
        todos.changed().connect(move |change| apply_change(&mut m.lock(), change));

        meta.set(&format!("joined_{}", idx), json!(true));
        store.connected().await?;
        debug!(participant = %name, prepopulated = store.is_prepopulated(), "Joined");

        Ok(Self {
            name,
            store,
            todos,
            title,
            meta,
            mirror,
        })
    }

    fn random_edit(&self, rng: &mut StdRng, seq: usize) {
        let len = self.todos.len();
        let text_len = self.title.len();
        match rng.gen_range(0..10) {
            0..=3 => {
                let index = rng.gen_range(0..=len);
                self.todos.insert(index, json!(format!("{}-{}", self.name, seq)));
            }
            4 if len > 0 => {
                self.todos.remove_at(rng.gen_range(0..len));
            }
            5 if len > 1 => {
                self.todos.move_item(rng.gen_range(0..len), rng.gen_range(0..len));
            }
            6 if len > 0 => {
                self.todos.set(rng.gen_range(0..len), json!(seq));
            }
            7 => {
                self.title.insert(rng.gen_range(0..=text_len), "ab");
            }
            8 if text_len > 0 => {
                let start = rng.gen_range(0..text_len);
                self.title.remove(start, (start + 2).min(text_len));
            }
            _ => {
                self.meta
                    .set(&format!("k{}", rng.gen_range(0..5)), json!(seq));
            }
        }
    }
}

fn apply_change(mirror: &mut Vec<Value>, change: &VectorChange<Value>) {
    match change.kind {
        VectorChangeType::Add => {
            if let Some(index) = change.new_index {
                if index <= mirror.len() {
                    mirror.splice(index..index, change.new_values.iter().cloned());
                }
            }
        }
        VectorChangeType::Remove => {
            if let Some(index) = change.old_index {
                let end = index + change.old_values.len();
                if end <= mirror.len() {
                    mirror.drain(index..end);
                }
            }
        }
        VectorChangeType::Set => {
            if let Some(index) = change.new_index {
                for (offset, value) in change.new_values.iter().enumerate() {
                    if let Some(slot) = mirror.get_mut(index + offset) {
                        *slot = value.clone();
                    }
                }
            }
        }
        VectorChangeType::Move => {
            if let (Some(from), Some(to)) = (change.old_index, change.new_index) {
                if from < mirror.len() && to < mirror.len() {
                    let value = mirror.remove(from);
                    mirror.insert(to, value);
                }
            }
        }
    }
}

fn check_convergence(participants: &[Participant]) -> bool {
    let Some(reference) = participants.first() else {
        return true;
    };
    let todos = reference.todos.to_vec();
    let title = reference.title.text();
    let meta = reference.meta.to_json();

    let mut converged = true;
    for p in participants {
        if p.todos.to_vec() != todos || p.title.text() != title || p.meta.to_json() != meta {
            warn!(participant = %p.name, "Replica diverged");
            converged = false;
        }
        if *p.mirror.lock() != p.todos.to_vec() {
            warn!(participant = %p.name, "Change events do not reproduce the vector");
            converged = false;
        }
    }
    converged
}

/// Random concurrent edits through adapters, relayed via the drive
pub async fn stress_test_convergence(
    num_participants: usize,
    ops_per_participant: usize,
    sync_every: usize,
) -> Result<StressTestStats> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Convergence Stress Test                             ║");
    println!("║  Participants: {} | Ops/Participant: {} | Sync every: {} ║",
             num_participants, ops_per_participant, sync_every);
    println!("╚════════════════════════════════════════════════════════════╝");

    let start = Instant::now();
    let drive = MemoryDrive::new();
    drive.create_document(DOC_PATH);

    println!("\n[Phase 1/3] Joining participants...");
    let mut participants = Vec::with_capacity(num_participants);
    for idx in 0..num_participants {
        participants.push(Participant::join(&drive, idx).await?);
        drive.sync()?;
    }
    println!("[Phase 1/3] ✓ Completed");

    println!("[Phase 2/3] Editing and relaying...");
    let mut rng = StdRng::from_entropy();
    let mut schedule = Box::pin(edit_schedule(
        num_participants,
        num_participants * ops_per_participant,
        sync_every,
    ));
    let mut sync_times = vec![];
    let mut relayed_mutations = 0;
    let mut seq = 0;
    while let Some(step) = schedule.next().await {
        match step {
            Step::Edit(idx) => {
                participants[idx].random_edit(&mut rng, seq);
                seq += 1;
            }
            Step::Sync => {
                let sync_start = Instant::now();
                relayed_mutations += drive.sync()?;
                sync_times.push(sync_start.elapsed());
                if sync_times.len() % 10 == 0 {
                    println!("  Sync rounds completed: {}", sync_times.len());
                }
            }
        }
    }
    println!("[Phase 2/3] ✓ Completed");

    println!("[Phase 3/3] Checking convergence...");
    let converged = check_convergence(&participants);
    let total_time = start.elapsed();

    for p in &participants {
        p.store.dispose();
    }
    println!("[Phase 3/3] ✓ Completed");

    let avg_sync_time = if !sync_times.is_empty() {
        sync_times.iter().sum::<Duration>() / sync_times.len() as u32
    } else {
        Duration::ZERO
    };
    let ops_per_second = seq as f64 / total_time.as_secs_f64();
    info!(participants = num_participants, relayed_mutations, converged, "Stress run finished");

    Ok(StressTestStats {
        num_participants,
        operations_per_participant: ops_per_participant,
        total_syncs: sync_times.len(),
        relayed_mutations,
        total_time,
        avg_sync_time,
        ops_per_second,
        converged,
    })
}

/// Convergence runs at increasing participant counts
pub async fn stress_test_scaling(max_participants: usize, step_size: usize) -> Result<bool> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║      Scaling Analysis - Participants vs Relay Cost          ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut all_converged = true;
    let mut participants = step_size;
    while participants <= max_participants {
        let stats = stress_test_convergence(participants, 50, participants * 5).await?;
        stats.print();
        all_converged &= stats.converged;
        participants += step_size;
    }
    Ok(all_converged)
}

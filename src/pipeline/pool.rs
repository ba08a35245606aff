//! Ограниченный пул фоновых задач.
//!
//! Каждая задача получает свой `EventSink`; ошибка или паника задачи
//! превращаются ровно в одно событие `Failed` на границе задачи.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info};
use tokio::sync::mpsc::Sender;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{GenerationJob, JobStage};
use crate::pipeline::events::{EventKind, EventSink, PipelineEvent};

/// Записи задач генерации; живут до завершения процесса
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Mutex<HashMap<Uuid, GenerationJob>>,
}

impl JobTable {
    fn lock(&self) -> AppResult<MutexGuard<'_, HashMap<Uuid, GenerationJob>>> {
        self.jobs
            .lock()
            .map_err(|_| AppError::Other("Job table lock poisoned".into()))
    }

    pub fn insert(&self, job: GenerationJob) -> AppResult<()> {
        self.lock()?.insert(job.id, job);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<GenerationJob> {
        self.lock().ok()?.get(&id).cloned()
    }

    /// Изменение записи задачи; неизвестный id игнорируется
    pub fn update<F>(&self, id: Uuid, apply: F) -> AppResult<()>
    where
        F: FnOnce(&mut GenerationJob) -> AppResult<()>,
    {
        match self.lock()?.get_mut(&id) {
            Some(job) => apply(job),
            None => Ok(()),
        }
    }

    pub fn advance(&self, id: Uuid, stage: JobStage) -> AppResult<()> {
        self.update(id, |job| job.advance(stage))
    }

    pub fn fail(&self, id: Uuid) {
        if let Err(e) = self.update(id, |job| {
            job.fail();
            Ok(())
        }) {
            error!("Не удалось отметить задачу {} как упавшую: {}", id, e);
        }
    }
}

/// Дескриптор запущенной задачи
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    handle: JoinHandle<()>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ожидание завершения; результат задачи приходит событием
    pub async fn wait(self) -> AppResult<()> {
        self.handle.await.map_err(AppError::from)
    }
}

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    events: Sender<PipelineEvent>,
    jobs: Arc<JobTable>,
}

impl WorkerPool {
    pub fn new(max_workers: usize, events: Sender<PipelineEvent>, jobs: Arc<JobTable>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            events,
            jobs,
        }
    }

    /// Запускает задачу; она ждёт свободного слота пула
    pub fn submit<F, Fut>(&self, id: Uuid, job: F) -> JobHandle
    where
        F: FnOnce(EventSink) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        let sink = EventSink::new(id, self.events.clone());
        let semaphore = Arc::clone(&self.semaphore);
        let jobs = Arc::clone(&self.jobs);

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    jobs.fail(id);
                    sink.failed(&AppError::Other("Worker pool is closed".into())).await;
                    return;
                }
            };
            info!("Задача {} запущена", id);

            // Отдельная задача, чтобы паника стала JoinError, а не обрывом пула
            let outcome = match tokio::spawn(job(sink.clone())).await {
                Ok(result) => result,
                Err(join_error) => Err(AppError::from(join_error)),
            };

            match outcome {
                Ok(()) => {
                    info!("Задача {} завершена", id);
                    sink.emit(EventKind::Completed).await;
                }
                Err(e) => {
                    error!("Задача {} завершилась ошибкой: {}", id, e);
                    jobs.fail(id);
                    sink.failed(&e).await;
                }
            }
        });

        JobHandle { id, handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use tokio::sync::mpsc;

    async fn drain(rx: &mut mpsc::Receiver<PipelineEvent>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn test_success_and_failure_reported_once() {
        let (tx, mut rx) = mpsc::channel(16);
        let pool = WorkerPool::new(2, tx, Arc::new(JobTable::default()));

        let ok = pool.submit(Uuid::new_v4(), |sink| async move {
            sink.chunk(1, 1).await;
            Ok(())
        });
        ok.wait().await.unwrap();

        let failed = pool.submit(Uuid::new_v4(), |_sink| async move {
            Err(AppError::Service("image service down".into()))
        });
        failed.wait().await.unwrap();

        let kinds = drain(&mut rx).await;
        assert!(matches!(kinds[0], EventKind::Chunk { completed: 1, total: 1 }));
        assert!(matches!(kinds[1], EventKind::Completed));
        assert!(matches!(kinds[2], EventKind::Failed { error: ErrorKind::Service, .. }));
        assert_eq!(kinds.len(), 3);
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_event() {
        let (tx, mut rx) = mpsc::channel(16);
        let pool = WorkerPool::new(1, tx, Arc::new(JobTable::default()));

        let handle = pool.submit(Uuid::new_v4(), |_sink| async move {
            if true {
                panic!("boom");
            }
            Ok(())
        });
        let id = handle.id();
        handle.wait().await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id, id);
        assert!(matches!(event.kind, EventKind::Failed { error: ErrorKind::Other, .. }));
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let (tx, _rx) = mpsc::channel(64);
        let pool = WorkerPool::new(2, tx, Arc::new(JobTable::default()));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<JobHandle> = (0..6)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                pool.submit(Uuid::new_v4(), move |_sink| async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            handle.wait().await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

use strand_core::channel::EventChannel;
use strand_core::error::TaskError;
use strand_core::pager::{Page, PageError, PageSource, PagedCollection};
use strand_core::queue::TaskQueue;

#[derive(Debug, Serialize, Deserialize)]
struct ReviewEvent {
    review_id: u64,
    action: String,
}

/// Canned commit list, served two entries per page.
struct CannedCommits {
    commits: Vec<String>,
}

#[async_trait]
impl PageSource for CannedCommits {
    type Item = String;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<String>, PageError> {
        let start: usize = match cursor {
            Some(c) => c
                .parse()
                .map_err(|e| PageError::fetch(format!("bad cursor: {e}")))?,
            None => 0,
        };
        let end = (start + 2).min(self.commits.len());
        let items = self.commits[start..end].to_vec();
        if end < self.commits.len() {
            Ok(Page::with_next(items, end.to_string()))
        } else {
            Ok(Page::last(items))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // (A) キューとイベントチャネルを用意
    let queue = TaskQueue::new();
    let events = EventChannel::new("review-updates");

    // (B) 購読側を起動（本番なら別タブ/別画面に相当）
    let mut rx = events.subscribe();
    let listener = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.decode::<ReviewEvent>() {
                Ok(update) => {
                    println!("[listener] review {} {}", update.review_id, update.action)
                }
                Err(e) => println!("[listener] undecodable event: {e}"),
            }
        }
    });

    // (C) タスク投入: 成功 / 失敗 / 実行中に追加するタスク
    {
        let events = events.clone();
        queue.add(move || async move {
            events
                .post(&ReviewEvent {
                    review_id: 42,
                    action: "published".into(),
                })
                .map_err(TaskError::from_err)?;
            Ok(())
        });
    }
    queue.add(|| async { Err(TaskError::failed("diff render failed")) });
    {
        let inner = queue.clone();
        let events = events.clone();
        queue.add(move || async move {
            // 実行中の add は同じドレインで処理される
            inner.add(move || async move {
                events
                    .post(&ReviewEvent {
                        review_id: 42,
                        action: "closed".into(),
                    })
                    .map_err(TaskError::from_err)?;
                Ok(())
            });
            Ok(())
        });
    }

    println!("before start: {:?}", queue.status());
    queue.start(CancellationToken::new()).await;
    println!("after drain: {:?}", queue.status());

    // (D) タスク内からのキャンセル: 後続は走らず pending に残る
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        queue.add(move || async move {
            cancel.cancel();
            Ok(())
        });
    }
    queue.add(|| async {
        println!("this task never runs");
        Ok(())
    });
    queue.start(cancel).await;
    println!("after cancelled drain: {:?}", queue.status());
    queue.clear();
    println!("after clear: {:?}", queue.status());

    // (E) ページングされたコミット一覧を最後まで取得
    let source = CannedCommits {
        commits: (1..=5).map(|n| format!("commit {n}")).collect(),
    };
    let mut commits = PagedCollection::new(source);
    if let Err(e) = commits.fetch_all().await {
        eprintln!("commit fetch failed: {e}");
    }
    println!("fetched {} commits: {:?}", commits.len(), commits.items());

    // デモなので listener は止める
    sleep(Duration::from_millis(50)).await;
    listener.abort();
}

use std::time::Duration;

use folio_plate_core::{Document, Editor, Node, PluginRegistry, Point, Selection};
use folio_plate_image_upload::{
    FileBlob, ImageUploadInterceptor, PasteEvent, SharedEditor, TokioLocalExecutor, upload_fn,
};
use tokio::task::LocalSet;
use tokio::time::sleep;

fn shared_editor() -> SharedEditor {
    SharedEditor::new(Editor::new(
        Document::from_blocks(vec![Node::paragraph("caption")]),
        Selection::collapsed(Point::new(vec![0, 0], 7)),
        PluginRegistry::richtext(),
    ))
}

fn slow_upload(
    delay: Duration,
    fail: bool,
) -> impl folio_plate_image_upload::UploadFn + 'static {
    upload_fn(move |file: FileBlob| async move {
        sleep(delay).await;
        if fail {
            anyhow::bail!("storage timed out for {}", file.name());
        }
        Ok::<_, anyhow::Error>(format!("https://cdn.example.com/{}", file.name()))
    })
}

#[tokio::test(start_paused = true)]
async fn image_appears_only_once_the_upload_resolves() {
    LocalSet::new()
        .run_until(async {
            let view = shared_editor();
            let interceptor = ImageUploadInterceptor::new(
                view.clone(),
                slow_upload(Duration::from_secs(2), false),
                TokioLocalExecutor,
            );

            let mut event = PasteEvent::new(vec![FileBlob::new("slow.png", "image/png", vec![1])]);
            assert!(interceptor.on_paste(&mut event));

            sleep(Duration::from_millis(1999)).await;
            assert_eq!(view.read(|e| e.doc().image_count()), 0);
            assert_eq!(interceptor.in_flight(), 1);

            sleep(Duration::from_millis(2)).await;
            assert_eq!(
                view.read(|e| e.doc().images().iter().map(|s| s.to_string()).collect::<Vec<_>>()),
                vec!["https://cdn.example.com/slow.png".to_string()]
            );
            assert_eq!(interceptor.in_flight(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn slow_failure_never_touches_the_document() {
    LocalSet::new()
        .run_until(async {
            let view = shared_editor();
            let before = view.read(|e| e.doc().clone());
            let interceptor = ImageUploadInterceptor::new(
                view.clone(),
                slow_upload(Duration::from_secs(5), true),
                TokioLocalExecutor,
            );

            let mut event = PasteEvent::new(vec![FileBlob::new("a.gif", "image/gif", vec![1])]);
            assert!(interceptor.on_paste(&mut event));

            sleep(Duration::from_secs(6)).await;
            assert_eq!(view.read(|e| e.doc().clone()), before);
            assert_eq!(interceptor.in_flight(), 0);
        })
        .await;
}

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use folio_plate_core::{Document, Editor, Node, Op, PluginRegistry, Point, Selection, Transaction};
use folio_plate_image_upload::{
    Coords, DocumentView, DropEvent, FileBlob, FileList, ImageUploadInterceptor, PasteEvent, SharedEditor,
    upload_fn,
};
use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};

type Reply = oneshot::Sender<anyhow::Result<String>>;

struct Harness {
    pool: LocalPool,
    view: SharedEditor,
    interceptor: ImageUploadInterceptor<SharedEditor, LocalSpawner>,
    calls: Rc<RefCell<Vec<FileBlob>>>,
    replies: Rc<RefCell<VecDeque<Reply>>>,
}

impl Harness {
    fn new(blocks: Vec<Node>, caret: Point) -> Self {
        let editor = Editor::new(
            Document::from_blocks(blocks),
            Selection::collapsed(caret),
            PluginRegistry::richtext(),
        );
        // y picks the block, x the byte offset.
        let view = SharedEditor::new(editor).with_hit_test(|_, coords| {
            Some(Point::new(vec![coords.y as usize, 0], coords.x as usize))
        });
        Self::with_view(view)
    }

    fn with_view(view: SharedEditor) -> Self {
        let pool = LocalPool::new();
        let calls: Rc<RefCell<Vec<FileBlob>>> = Rc::default();
        let replies: Rc<RefCell<VecDeque<Reply>>> = Rc::default();

        let upload = {
            let calls = calls.clone();
            let replies = replies.clone();
            upload_fn(move |file: FileBlob| {
                calls.borrow_mut().push(file);
                let (tx, rx) = oneshot::channel();
                replies.borrow_mut().push_back(tx);
                async move {
                    rx.await
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("upload abandoned")))
                }
            })
        };

        let interceptor = ImageUploadInterceptor::new(view.clone(), upload, pool.spawner());
        Self {
            pool,
            view,
            interceptor,
            calls,
            replies,
        }
    }

    fn settle_next(&mut self, outcome: anyhow::Result<String>) {
        let reply = self.replies.borrow_mut().pop_front().expect("an upload is waiting");
        reply.send(outcome).unwrap();
        self.pool.run_until_stalled();
    }

    fn settle_last(&mut self, outcome: anyhow::Result<String>) {
        let reply = self.replies.borrow_mut().pop_back().expect("an upload is waiting");
        reply.send(outcome).unwrap();
        self.pool.run_until_stalled();
    }

    fn doc(&self) -> Document {
        self.view.read(|editor| editor.doc().clone())
    }

    fn texts(&self) -> Vec<String> {
        self.doc()
            .children
            .iter()
            .map(|n| match n {
                Node::Void(v) if v.kind == "image" => format!("[{}]", v.src().unwrap_or("")),
                other => other.plain_text(),
            })
            .collect()
    }
}

fn png(name: &str) -> FileBlob {
    FileBlob::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

#[test]
fn drop_without_files_is_not_handled() {
    let mut h = Harness::new(vec![Node::paragraph("text")], Point::new(vec![0, 0], 0));
    let before = h.doc();

    let mut event = DropEvent::new(FileList::new(), Coords::new(1.0, 0.0));
    assert!(!h.interceptor.on_drop(&mut event));
    h.pool.run_until_stalled();

    assert!(!event.flags.default_prevented());
    assert!(!event.flags.propagation_stopped());
    assert!(h.calls.borrow().is_empty());
    assert_eq!(h.doc(), before);
}

#[test]
fn paste_without_files_is_not_handled() {
    let mut h = Harness::new(vec![Node::paragraph("text")], Point::new(vec![0, 0], 0));

    let mut event = PasteEvent::new(FileList::new());
    assert!(!h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();

    assert!(h.calls.borrow().is_empty());
    assert_eq!(h.interceptor.in_flight(), 0);
}

#[test]
fn dropping_a_pdf_falls_through_without_uploading() {
    let mut h = Harness::new(vec![Node::paragraph("text")], Point::new(vec![0, 0], 0));
    let before = h.doc();

    let pdf = FileBlob::new("manuscript.pdf", "application/pdf", b"%PDF-1.7".to_vec());
    let mut event = DropEvent::new(vec![pdf], Coords::new(2.0, 0.0));
    assert!(!h.interceptor.on_drop(&mut event));
    h.pool.run_until_stalled();

    assert!(!event.flags.default_prevented());
    assert!(h.calls.borrow().is_empty());
    assert_eq!(h.doc(), before);
}

#[test]
fn non_image_first_file_wins_over_later_images() {
    let mut h = Harness::new(vec![Node::paragraph("text")], Point::new(vec![0, 0], 0));

    let pdf = FileBlob::new("synopsis.pdf", "application/pdf", b"%PDF".to_vec());
    let mut event = PasteEvent::new(vec![pdf, png("cover.png")]);
    assert!(!h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();

    assert!(h.calls.borrow().is_empty());
}

#[test]
fn dropped_png_is_uploaded_once_and_inserted_at_the_drop_point() {
    let mut h = Harness::new(
        vec![Node::paragraph("first para"), Node::paragraph("second para")],
        Point::new(vec![0, 0], 0),
    );

    let file = png("cover.png");
    let mut event = DropEvent::new(vec![file.clone()], Coords::new(6.0, 1.0));
    assert!(h.interceptor.on_drop(&mut event));
    assert!(event.flags.default_prevented());
    assert!(event.flags.propagation_stopped());
    assert_eq!(h.interceptor.in_flight(), 1);

    h.pool.run_until_stalled();
    assert_eq!(h.calls.borrow().as_slice(), &[file]);
    assert_eq!(h.doc().image_count(), 0, "nothing is inserted before the upload resolves");

    h.settle_next(Ok("https://cdn.example.com/blog/cover.png".into()));

    assert_eq!(
        h.texts(),
        vec![
            "first para",
            "second",
            "[https://cdn.example.com/blog/cover.png]",
            " para"
        ]
    );
    assert_eq!(h.interceptor.in_flight(), 0);
    assert_eq!(h.calls.borrow().len(), 1);
    assert_eq!(
        h.view.read(|editor| editor.last_source().map(str::to_string)),
        Some("image_upload:drop".to_string())
    );
}

#[test]
fn paste_uploads_only_the_first_of_several_images() {
    let mut h = Harness::new(vec![Node::paragraph("ab")], Point::new(vec![0, 0], 1));

    let jpeg = FileBlob::new("photo.jpg", "image/jpeg", vec![0xff, 0xd8]);
    let mut event = PasteEvent::new(vec![jpeg.clone(), png("second.png")]);
    assert!(h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();

    assert_eq!(h.calls.borrow().as_slice(), &[jpeg]);
    h.settle_next(Ok("https://x/photo.jpg".into()));

    assert_eq!(h.doc().images(), vec!["https://x/photo.jpg"]);
    assert!(h.replies.borrow().is_empty());
}

#[test]
fn paste_replaces_the_selected_range() {
    let mut h = Harness::new(vec![Node::paragraph("keep DROP keep")], Point::new(vec![0, 0], 0));
    h.view.update(|editor| {
        editor.set_selection(Selection::new(
            Point::new(vec![0, 0], 5),
            Point::new(vec![0, 0], 9),
        ))
    });

    let mut event = PasteEvent::new(vec![png("shot.png")]);
    assert!(h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();
    h.settle_next(Ok("https://x/shot.png".into()));

    assert_eq!(h.texts(), vec!["keep ", "[https://x/shot.png]", " keep"]);
}

#[test]
fn failed_upload_leaves_the_document_alone() {
    let mut h = Harness::new(vec![Node::paragraph("text")], Point::new(vec![0, 0], 2));
    let before = h.doc();

    let mut event = PasteEvent::new(vec![png("broken.png")]);
    assert!(h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();

    h.settle_next(Err(anyhow::anyhow!("bucket policy denied insert")));

    assert!(event.flags.default_prevented());
    assert_eq!(h.doc(), before);
    assert_eq!(h.interceptor.in_flight(), 0);
    assert!(!h.view.read(|editor| editor.can_undo()));
}

#[test]
fn abandoned_upload_counts_as_failure() {
    let mut h = Harness::new(vec![Node::paragraph("text")], Point::new(vec![0, 0], 0));

    let mut event = PasteEvent::new(vec![png("lost.png")]);
    assert!(h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();

    drop(h.replies.borrow_mut().pop_front());
    h.pool.run_until_stalled();

    assert_eq!(h.doc().image_count(), 0);
    assert_eq!(h.interceptor.in_flight(), 0);
}

#[test]
fn each_success_is_one_transaction() {
    let mut h = Harness::new(vec![Node::paragraph("abcdef")], Point::new(vec![0, 0], 3));
    let before = h.doc();

    let mut event = PasteEvent::new(vec![png("a.png")]);
    assert!(h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();
    h.settle_next(Ok("https://x/a.png".into()));

    h.view.update(|editor| {
        assert_eq!(editor.undo_depth(), 1);
        assert_eq!(editor.last_source(), Some("image_upload:paste"));
        assert!(editor.undo());
    });
    assert_eq!(h.doc(), before);
}

#[test]
fn rapid_pastes_apply_in_completion_order() {
    let mut h = Harness::new(vec![Node::paragraph("abc")], Point::new(vec![0, 0], 1));

    for name in ["a.png", "b.png"] {
        let mut event = PasteEvent::new(vec![png(name)]);
        assert!(h.interceptor.on_paste(&mut event));
    }
    h.pool.run_until_stalled();
    assert_eq!(h.calls.borrow().len(), 2);
    assert_eq!(h.interceptor.in_flight(), 2);

    h.settle_last(Ok("https://x/b.png".into()));
    assert_eq!(h.texts(), vec!["a", "[https://x/b.png]", "bc"]);

    h.settle_next(Ok("https://x/a.png".into()));
    assert_eq!(h.doc().images(), vec!["https://x/a.png", "https://x/b.png"]);
    assert_eq!(h.view.read(|editor| editor.undo_depth()), 2);
}

#[test]
fn edits_during_upload_move_the_insertion_but_do_not_break_it() {
    let mut h = Harness::new(
        vec![
            Node::paragraph("one"),
            Node::paragraph("two"),
            Node::paragraph("three"),
        ],
        Point::new(vec![2, 0], 3),
    );

    let mut event = PasteEvent::new(vec![png("late.png")]);
    assert!(h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();

    h.view
        .update(|editor| {
            editor.apply(Transaction::new(vec![
                Op::RemoveNode { path: vec![2] },
                Op::RemoveNode { path: vec![1] },
            ]))
        })
        .unwrap();

    h.settle_next(Ok("https://x/late.png".into()));

    assert_eq!(h.texts(), vec!["one", "[https://x/late.png]", ""]);
}

#[test]
fn drop_outside_text_uses_the_current_selection() {
    let editor = Editor::new(
        Document::from_blocks(vec![Node::paragraph("hello")]),
        Selection::collapsed(Point::new(vec![0, 0], 5)),
        PluginRegistry::richtext(),
    );
    let mut h = Harness::with_view(SharedEditor::new(editor));

    let mut event = DropEvent::new(vec![png("a.png")], Coords::new(400.0, 900.0));
    assert!(h.interceptor.on_drop(&mut event));
    h.pool.run_until_stalled();
    h.settle_next(Ok("https://x/a.png".into()));

    assert_eq!(h.texts(), vec!["hello", "[https://x/a.png]", ""]);
}

#[test]
fn deleting_the_last_text_block_during_upload_still_inserts() {
    let mut h = Harness::new(
        vec![Node::divider(), Node::paragraph("text")],
        Point::new(vec![1, 0], 2),
    );

    let mut event = PasteEvent::new(vec![png("late.png")]);
    assert!(h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();

    h.view
        .update(|editor| editor.apply(Transaction::new(vec![Op::RemoveNode { path: vec![1] }])))
        .unwrap();
    assert_eq!(h.doc().children.len(), 1);

    h.settle_next(Ok("https://x/late.png".into()));

    assert_eq!(h.texts(), vec!["", "[https://x/late.png]", ""]);
    assert_eq!(h.view.read(|editor| editor.undo_depth()), 2);
}

#[test]
fn paste_into_an_image_only_body_appends_the_upload() {
    let mut h = Harness::new(
        vec![Node::image("https://x/cover.png", None)],
        Point::new(vec![0], 0),
    );

    let mut event = PasteEvent::new(vec![png("second.png")]);
    assert!(h.interceptor.on_paste(&mut event));
    h.pool.run_until_stalled();
    h.settle_next(Ok("https://x/second.png".into()));

    assert_eq!(
        h.texts(),
        vec!["[https://x/cover.png]", "[https://x/second.png]", ""]
    );
}

#[test]
fn shut_down_executor_leaves_the_event_unhandled() {
    let pool = LocalPool::new();
    let spawner = pool.spawner();
    drop(pool);

    let view = SharedEditor::new(Editor::new(
        Document::from_blocks(vec![Node::paragraph("text")]),
        Selection::collapsed(Point::new(vec![0, 0], 0)),
        PluginRegistry::richtext(),
    ));
    let uploads = Rc::new(RefCell::new(0usize));
    let upload = {
        let uploads = uploads.clone();
        upload_fn(move |_file: FileBlob| {
            *uploads.borrow_mut() += 1;
            async { Ok::<_, anyhow::Error>("https://x/never.png".to_string()) }
        })
    };
    let interceptor = ImageUploadInterceptor::new(view.clone(), upload, spawner);

    let mut event = PasteEvent::new(vec![png("a.png")]);
    assert!(!interceptor.on_paste(&mut event));

    assert!(!event.flags.default_prevented());
    assert!(!event.flags.propagation_stopped());
    assert_eq!(interceptor.in_flight(), 0);
    assert_eq!(*uploads.borrow(), 0);
    assert_eq!(view.read(|e| e.doc().image_count()), 0);
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use config_model::{OnLastSlide, SlideshowOptions};
use rust_feh::error::Error;
use rust_feh::events::{Command, ControlEvent};
use rust_feh::filelist::Discovery;
use rust_feh::loader::DecodingLoader;
use rust_feh::navigation::{Directive, PlaylistContext};
use rust_feh::render::TitleRenderer;
use rust_feh::tasks::controller::{self, ControllerSettings};
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z/C/HwAFgwJ/lc7BnwAAAABJRU5ErkJggg==";

type Ctx = PlaylistContext<DecodingLoader, TitleRenderer<Vec<u8>>>;

fn write_fixture(path: &Path) {
    fs::write(path, STANDARD.decode(PNG_1X1).unwrap()).unwrap();
}

fn fixture_dir(names: &[&str]) -> (tempfile::TempDir, Discovery) {
    let tmp = tempdir().unwrap();
    for name in names {
        write_fixture(&tmp.path().join(name));
    }
    let discovery = Discovery::new(vec![tmp.path().to_path_buf()], Vec::new());
    (tmp, discovery)
}

fn context(discovery: &mut Discovery, options: SlideshowOptions) -> Ctx {
    let list = discovery.discover().unwrap();
    let mut ctx = PlaylistContext::new(
        list,
        options,
        DecodingLoader::new(),
        TitleRenderer::new(Vec::new()),
    )
    .unwrap();
    ctx.start(true).unwrap();
    ctx
}

fn current_name(ctx: &Ctx) -> String {
    ctx.current().unwrap().name().to_string()
}

fn cmd(c: Command) -> ControlEvent {
    ControlEvent::Command(c)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn commands_are_applied_in_order_until_quit() {
    let (_tmp, mut discovery) = fixture_dir(&["a.png", "b.png", "c.png"]);
    let mut ctx = context(&mut discovery, SlideshowOptions::default());
    let (tx, rx) = mpsc::channel(16);
    for event in [
        cmd(Command::Change(Directive::Next)),
        cmd(Command::Change(Directive::Next)),
        cmd(Command::Change(Directive::Prev)),
        cmd(Command::ZoomIn),
        cmd(Command::Quit),
        cmd(Command::Change(Directive::Next)),
    ] {
        tx.send(event).await.unwrap();
    }

    controller::run(
        &mut ctx,
        rx,
        None,
        ControllerSettings::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(current_name(&ctx), "b.png");
    assert!(ctx.viewport().zoom > 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slideshow_timer_advances_and_quits_at_the_end() {
    let (_tmp, mut discovery) = fixture_dir(&["a.png", "b.png", "c.png"]);
    let options = SlideshowOptions {
        on_last_slide: OnLastSlide::Quit,
        ..SlideshowOptions::default()
    };
    let mut ctx = context(&mut discovery, options);
    let (_tx, rx) = mpsc::channel(4);
    let settings = ControllerSettings {
        delay: Some(Duration::from_millis(20)),
        ..ControllerSettings::default()
    };

    tokio::time::timeout(
        Duration::from_secs(5),
        controller::run(&mut ctx, rx, None, settings, CancellationToken::new()),
    )
    .await
    .expect("slideshow should quit after the last slide")
    .unwrap();

    assert_eq!(current_name(&ctx), "c.png");
    let out = String::from_utf8(ctx.renderer().get_ref().clone()).unwrap();
    assert_eq!(out.lines().count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_stops_the_loop() {
    let (_tmp, mut discovery) = fixture_dir(&["a.png", "b.png"]);
    let mut ctx = context(&mut discovery, SlideshowOptions::default());
    let (_tx, rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        controller::run(&mut ctx, rx, None, ControllerSettings::default(), cancel),
    )
    .await
    .expect("cancel should stop the controller")
    .unwrap();
    assert_eq!(current_name(&ctx), "a.png");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_change_on_disk_reloads_or_drops_the_current_entry() {
    let (tmp, mut discovery) = fixture_dir(&["a.png", "b.png"]);
    let mut ctx = context(&mut discovery, SlideshowOptions::default());
    let a = tmp.path().join("a.png");
    fs::write(&a, b"scribbled over").unwrap();

    let (tx, rx) = mpsc::channel(4);
    tx.send(ControlEvent::FileChanged(a.clone())).await.unwrap();
    tx.send(ControlEvent::Shutdown).await.unwrap();
    controller::run(&mut ctx, rx, None, ControllerSettings::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(current_name(&ctx), "b.png");
    assert_eq!(ctx.list().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_list_picks_up_new_files_and_keeps_position() {
    let (tmp, mut discovery) = fixture_dir(&["b.png", "c.png"]);
    let mut ctx = context(&mut discovery, SlideshowOptions::default());
    write_fixture(&tmp.path().join("a.png"));

    let (tx, rx) = mpsc::channel(4);
    tx.send(cmd(Command::ReloadList)).await.unwrap();
    tx.send(ControlEvent::Shutdown).await.unwrap();
    controller::run(
        &mut ctx,
        rx,
        Some(discovery),
        ControllerSettings::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(ctx.list().len(), 3);
    assert_eq!(current_name(&ctx), "b.png");
    assert_eq!(ctx.position(), Some((2, 3)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_filelist_command_writes_a_fresh_file() {
    let (tmp, mut discovery) = fixture_dir(&["a.png", "b.png"]);
    let mut ctx = context(&mut discovery, SlideshowOptions::default());
    let base = tmp.path().join("saved");
    fs::write(&base, "occupied\n").unwrap();

    let (tx, rx) = mpsc::channel(4);
    tx.send(cmd(Command::SaveFilelist)).await.unwrap();
    tx.send(cmd(Command::Quit)).await.unwrap();
    let settings = ControllerSettings {
        save_base: base.clone(),
        ..ControllerSettings::default()
    };
    controller::run(&mut ctx, rx, None, settings, CancellationToken::new())
        .await
        .unwrap();

    let saved = fs::read_to_string(tmp.path().join("saved_001")).unwrap();
    let lines: Vec<PathBuf> = saved.lines().map(PathBuf::from).collect();
    assert_eq!(lines, ctx.list().paths());
    assert_eq!(fs::read_to_string(&base).unwrap(), "occupied\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pan_and_caption_commands_update_the_display() {
    let (tmp, mut discovery) = fixture_dir(&["a.png", "b.png"]);
    let mut ctx = context(&mut discovery, SlideshowOptions::default())
        .with_caption_dir(Some(PathBuf::from(".tc")));

    let (tx, rx) = mpsc::channel(8);
    for command in ["pan 10 -5", "right", "caption sunset over the bay", "q"] {
        tx.send(cmd(command.parse().unwrap())).await.unwrap();
    }
    controller::run(&mut ctx, rx, None, ControllerSettings::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((ctx.viewport().pan_x, ctx.viewport().pan_y), (60, -5));
    let saved = fs::read_to_string(tmp.path().join(".tc").join("a.txt")).unwrap();
    assert_eq!(saved, "sunset over the bay\n");
    let out = String::from_utf8(ctx.renderer().get_ref().clone()).unwrap();
    let last = out.lines().last().unwrap();
    assert!(last.ends_with(" | sunset over the bay"), "{last}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn caption_without_caption_path_is_ignored() {
    let (tmp, mut discovery) = fixture_dir(&["a.png"]);
    let mut ctx = context(&mut discovery, SlideshowOptions::default());

    let (tx, rx) = mpsc::channel(4);
    tx.send(cmd(Command::Caption("lost".into()))).await.unwrap();
    tx.send(cmd(Command::Quit)).await.unwrap();
    controller::run(&mut ctx, rx, None, ControllerSettings::default(), CancellationToken::new())
        .await
        .unwrap();

    assert!(!tmp.path().join(".tc").exists());
    assert_eq!(current_name(&ctx), "a.png");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exhausted_list_surfaces_no_more_slides() {
    let (tmp, mut discovery) = fixture_dir(&["a.png", "b.png"]);
    let mut ctx = context(&mut discovery, SlideshowOptions::default());
    fs::write(tmp.path().join("a.png"), b"x").unwrap();
    fs::write(tmp.path().join("b.png"), b"x").unwrap();

    let (tx, rx) = mpsc::channel(4);
    tx.send(cmd(Command::Change(Directive::Next))).await.unwrap();
    let err = controller::run(&mut ctx, rx, None, ControllerSettings::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoMoreSlides)));
    assert!(ctx.list().is_empty());
}

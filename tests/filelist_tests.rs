use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use config_model::{SlideshowOptions, SortKey};
use image::RgbaImage;
use rust_feh::entry::FileEntry;
use rust_feh::filelist::{self, Discovery};
use rust_feh::list::ImageList;
use rust_feh::loader::DecodingLoader;
use rust_feh::navigation::{Directive, Outcome, PlaylistContext};
use rust_feh::render::TitleRenderer;
use tempfile::tempdir;

const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z/C/HwAFgwJ/lc7BnwAAAABJRU5ErkJggg==";

fn write_fixture(path: &Path) {
    let png = STANDARD.decode(PNG_1X1).unwrap();
    fs::write(path, png).unwrap();
}

fn write_sized(path: &Path, w: u32, h: u32) {
    RgbaImage::new(w, h).save(path).unwrap();
}

#[test]
fn discovery_walks_directories_in_name_order() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::create_dir_all(root.join(".thumbs")).unwrap();
    write_fixture(&root.join("b.png"));
    write_fixture(&root.join("a.png"));
    write_fixture(&root.join("sub").join("c.png"));
    write_fixture(&root.join(".thumbs").join("x.png"));

    let mut flat = Discovery::new(vec![root.to_path_buf()], Vec::new());
    let list = flat.discover().unwrap();
    assert_eq!(list.paths(), [root.join("a.png"), root.join("b.png")]);

    let mut deep = Discovery::new(vec![root.to_path_buf()], Vec::new());
    deep.recursive = true;
    let list = deep.discover().unwrap();
    assert_eq!(
        list.paths(),
        [root.join("a.png"), root.join("b.png"), root.join("sub").join("c.png")]
    );
}

#[test]
fn discovery_skips_missing_sources() {
    let tmp = tempdir().unwrap();
    let real = tmp.path().join("real.png");
    write_fixture(&real);
    let mut discovery = Discovery::new(vec![tmp.path().join("ghost.png"), real.clone()], Vec::new());
    let list = discovery.discover().unwrap();
    assert_eq!(list.paths(), [real]);
}

#[test]
fn saved_filelist_reloads_in_the_same_order() {
    let tmp = tempdir().unwrap();
    let paths = ["z.jpg", "relative/a.png", "/abs/m.gif", "with space.png"];
    let list: ImageList = paths.iter().filter_map(|p| FileEntry::new(*p)).collect();

    let base = tmp.path().join("feh_filelist");
    let saved = filelist::save_filelist(&list, &base).unwrap();
    assert_eq!(saved, base);
    let again = filelist::save_filelist(&list, &base).unwrap();
    assert_eq!(again, tmp.path().join("feh_filelist_001"));

    let mut discovery = Discovery::new(Vec::new(), vec![saved]);
    let reloaded = discovery.discover().unwrap();
    assert_eq!(reloaded.paths(), list.paths());
}

#[test]
fn preload_drops_unprobeable_entries() {
    let tmp = tempdir().unwrap();
    let good = tmp.path().join("good.png");
    let junk = tmp.path().join("junk.png");
    write_fixture(&good);
    fs::write(&junk, b"not an image at all").unwrap();
    let mut list: ImageList = [&good, &junk, &tmp.path().join("gone.png")]
        .into_iter()
        .filter_map(FileEntry::new)
        .collect();

    let failures = filelist::preload_info(&mut list, false);
    assert_eq!(list.paths(), [good.clone()]);
    let labels: Vec<_> = failures.iter().map(|(_, e)| e.label()).collect();
    assert_eq!(labels, ["unsupported", "not-found"]);

    let info = list.iter().next().unwrap().1.info().unwrap();
    assert_eq!((info.width, info.height), (1, 1));
    assert!(info.has_alpha);
    assert_eq!(info.format, "png");

    let table = filelist::format_list(&list);
    let row = table.lines().nth(1).unwrap();
    assert!(row.starts_with("1\tpng\t1\t1\t1\t"), "{row}");
    assert!(row.ends_with(&good.display().to_string()));
}

#[test]
fn partition_separates_loadable_files() {
    let tmp = tempdir().unwrap();
    let good = tmp.path().join("good.png");
    let bad = tmp.path().join("bad.jpg");
    write_fixture(&good);
    fs::write(&bad, b"JFIF? no").unwrap();
    let list: ImageList = [&good, &bad].into_iter().filter_map(FileEntry::new).collect();
    let (ok, failed) = filelist::partition_loadable(&list, &mut DecodingLoader::new());
    assert_eq!(ok, [good]);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, bad);
    assert_eq!(failed[0].1.label(), "magic");
}

#[test]
fn slideshow_over_real_files_skips_corrupt_entries() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a.png");
    let b = tmp.path().join("b.png");
    let c = tmp.path().join("c.png");
    fs::write(&a, b"\x89PNG\r\n\x1a\ntruncated").unwrap();
    write_fixture(&b);
    write_fixture(&c);

    let mut discovery = Discovery::new(vec![tmp.path().to_path_buf()], Vec::new());
    let list = discovery.discover().unwrap();
    let mut ctx = PlaylistContext::new(
        list,
        SlideshowOptions::default(),
        DecodingLoader::new(),
        TitleRenderer::new(Vec::new()),
    )
    .unwrap();

    assert_eq!(ctx.start(true).unwrap(), Outcome::Shown);
    assert_eq!(ctx.current().unwrap().path(), b);
    assert_eq!(ctx.list().len(), 2);
    ctx.change_image(Directive::Next, true).unwrap();

    let out = String::from_utf8(ctx.renderer().get_ref().clone()).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        [
            format!("feh [1 of 2] - {}", b.display()),
            format!("feh [2 of 2] - {}", c.display()),
        ]
    );
}

#[test]
fn startup_sort_by_width_probes_and_orders() {
    let tmp = tempdir().unwrap();
    let wide = tmp.path().join("a.png");
    let narrow = tmp.path().join("b.png");
    let junk = tmp.path().join("c.png");
    write_sized(&wide, 9, 2);
    write_sized(&narrow, 2, 9);
    fs::write(&junk, b"nope").unwrap();

    let list: ImageList = [&wide, &narrow, &junk]
        .into_iter()
        .filter_map(FileEntry::new)
        .collect();
    let options = SlideshowOptions {
        sort: Some(SortKey::Width),
        ..SlideshowOptions::default()
    };
    let mut ctx = PlaylistContext::new(
        list,
        options,
        DecodingLoader::new(),
        TitleRenderer::new(Vec::new()),
    )
    .unwrap();
    ctx.start(false).unwrap();
    let order: Vec<PathBuf> = ctx.list().paths();
    assert_eq!(order, [narrow.clone(), wide]);
    assert_eq!(ctx.current().unwrap().path(), narrow);
}

#[test]
fn captions_are_rendered_next_to_the_title() {
    let tmp = tempdir().unwrap();
    let img = tmp.path().join("cat.png");
    write_fixture(&img);
    fs::create_dir_all(tmp.path().join(".tc")).unwrap();
    fs::write(tmp.path().join(".tc").join("cat.txt"), "a sleepy cat\n").unwrap();

    let list: ImageList = [&img].into_iter().filter_map(FileEntry::new).collect();
    let mut ctx = PlaylistContext::new(
        list,
        SlideshowOptions::default(),
        DecodingLoader::new(),
        TitleRenderer::new(Vec::new()),
    )
    .unwrap()
    .with_caption_dir(Some(PathBuf::from(".tc")));
    ctx.start(true).unwrap();
    let out = String::from_utf8(ctx.renderer().get_ref().clone()).unwrap();
    assert_eq!(
        out.trim_end(),
        format!("feh [1 of 1] - {} | a sleepy cat", img.display())
    );
}

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use page_compose::*;
use std::collections::HashSet;
use std::io::Cursor;

/// A PDF whose pages are `width` x `height`, with an optional `/Rotate` on
/// the page tree root that every page inherits
fn create_test_pdf(num_pages: usize, width: i64, height: i64, rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));

    let mut kids = Vec::new();
    for i in 0..num_pages {
        let content = format!("BT /F1 12 Tf 72 72 Td (Page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    // MediaBox and Resources live on the tree root and are inherited
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ]),
        ),
        ("Resources", Object::Dictionary(resources)),
    ]);
    if let Some(rotate) = rotate {
        pages_dict.set("Rotate", Object::Integer(rotate));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

fn png(width: u32, height: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::new(width, height)),
        ImageFormat::Png,
    )
}

async fn export_preview(workspace: &Workspace) -> Document {
    let artifact = workspace.export(&ExportMode::Preview).await.unwrap();
    assert!(artifact.file_name.is_none());
    Document::load_mem(&artifact.bytes).unwrap()
}

fn output_pages(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

fn media_box(doc: &Document, page_id: ObjectId) -> Vec<f32> {
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_float().unwrap())
        .collect()
}

fn rotate_of(doc: &Document, page_id: ObjectId) -> i64 {
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"Rotate")
        .map(|r| r.as_i64().unwrap())
        .unwrap_or(0)
}

fn page_content(doc: &Document, page_id: ObjectId) -> String {
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

fn ids(list: &[PageId]) -> HashSet<PageId> {
    list.iter().copied().collect()
}

#[tokio::test]
async fn test_rotated_image_page_swaps_dimensions() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    let added = workspace
        .add_files(vec![IncomingFile::new("tall.png", "image/png", png(100, 200))])
        .await
        .added_pages;
    workspace.rotate(&ids(&added), 90).await.unwrap();

    let doc = export_preview(&workspace).await;
    let pages = output_pages(&doc);
    assert_eq!(pages.len(), 1);
    assert_eq!(media_box(&doc, pages[0]), vec![0.0, 0.0, 200.0, 100.0]);
    // The image is drawn turned, not flagged for the viewer to turn
    assert_eq!(rotate_of(&doc, pages[0]), 0);
    assert!(page_content(&doc, pages[0]).contains("0 -100 200 0 0 100 cm /Im0 Do"));
}

#[tokio::test]
async fn test_image_page_keeps_natural_size_unrotated() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    let jpeg = encode(
        DynamicImage::ImageRgb8(RgbImage::new(64, 32)),
        ImageFormat::Jpeg,
    );
    let rgba = encode(
        DynamicImage::ImageRgba8(RgbaImage::new(30, 40)),
        ImageFormat::Png,
    );
    let added = workspace
        .add_files(vec![
            IncomingFile::new("wide.jpg", "image/jpeg", jpeg),
            IncomingFile::new("alpha.png", "image/png", rgba),
        ])
        .await
        .added_pages;
    workspace.rotate(&ids(&added[1..]), 180).await.unwrap();

    let doc = export_preview(&workspace).await;
    let pages = output_pages(&doc);
    assert_eq!(media_box(&doc, pages[0]), vec![0.0, 0.0, 64.0, 32.0]);
    assert_eq!(media_box(&doc, pages[1]), vec![0.0, 0.0, 30.0, 40.0]);
    assert!(page_content(&doc, pages[1]).contains("-30 0 0 -40 30 40 cm"));
}

#[tokio::test]
async fn test_blank_pages_use_configured_size() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    let blank = workspace.insert_blank().await;
    workspace.rotate(&ids(&[blank]), 90).await.unwrap();

    let doc = export_preview(&workspace).await;
    let pages = output_pages(&doc);
    assert_eq!(media_box(&doc, pages[0]), vec![0.0, 0.0, 595.0, 842.0]);
    assert_eq!(rotate_of(&doc, pages[0]), 90);

    let options = ComposeOptions {
        blank_page_size: PageSize::new(300.0, 400.0),
        ..ComposeOptions::default()
    };
    let mut workspace = Workspace::new(options);
    workspace.insert_blank().await;
    let doc = export_preview(&workspace).await;
    assert_eq!(
        media_box(&doc, output_pages(&doc)[0]),
        vec![0.0, 0.0, 300.0, 400.0]
    );
}

#[tokio::test]
async fn test_pdf_rotation_adds_to_embedded_rotation() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    let added = workspace
        .add_files(vec![IncomingFile::new(
            "rotated.pdf",
            "application/pdf",
            create_test_pdf(2, 500, 700, Some(90)),
        )])
        .await
        .added_pages;
    workspace.rotate(&ids(&added[..1]), 270).await.unwrap();
    workspace.rotate(&ids(&added[1..]), 90).await.unwrap();

    let doc = export_preview(&workspace).await;
    let pages = output_pages(&doc);
    assert_eq!(rotate_of(&doc, pages[0]), 0);
    assert_eq!(rotate_of(&doc, pages[1]), 180);
}

#[tokio::test]
async fn test_pdf_pages_carry_inherited_attributes() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    workspace
        .add_files(vec![IncomingFile::new(
            "doc.pdf",
            "application/pdf",
            create_test_pdf(3, 400, 600, None),
        )])
        .await;
    let ids_in_order = workspace.pages().ids();
    workspace.reorder(&[ids_in_order[2], ids_in_order[0], ids_in_order[0], ids_in_order[1]]).await;

    let doc = export_preview(&workspace).await;
    let pages = output_pages(&doc);
    assert_eq!(pages.len(), 3);
    for &page_id in &pages {
        assert_eq!(media_box(&doc, page_id), vec![0.0, 0.0, 400.0, 600.0]);
        let resources = doc.get_dictionary(page_id).unwrap().get(b"Resources").unwrap();
        assert!(resources.as_dict().unwrap().has(b"Font"));
    }
    assert!(page_content(&doc, pages[0]).contains("(Page 3)"));
    assert!(page_content(&doc, pages[1]).contains("(Page 1)"));
}

#[tokio::test]
async fn test_duplicated_pdf_page_is_copied_twice() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    let added = workspace
        .add_files(vec![IncomingFile::new(
            "doc.pdf",
            "application/pdf",
            create_test_pdf(1, 612, 792, None),
        )])
        .await
        .added_pages;
    let copy = workspace.duplicate(&ids(&added)).await;
    workspace
        .add_text_overlay(&PageTarget::Pages(ids(&copy)), TextOverlay::new("COPY"))
        .await
        .unwrap();

    let doc = export_preview(&workspace).await;
    let pages = output_pages(&doc);
    assert_eq!(pages.len(), 2);
    assert_ne!(pages[0], pages[1]);
    assert!(!page_content(&doc, pages[0]).contains("(COPY)"));
    assert!(page_content(&doc, pages[1]).contains("(COPY)"));
}

#[test]
fn test_overlay_coordinate_mapping() {
    let overlay = TextOverlay::new("Top").at(50.0, 0.0);
    let geometry = PageGeometry {
        x0: 0.0,
        y0: 0.0,
        width: 600.0,
        height: 800.0,
        rotation: 0,
    };
    let placement = place_overlay(&overlay, &geometry);
    assert_eq!((placement.x, placement.y), (300.0, 800.0));
}

#[tokio::test]
async fn test_overlays_drawn_in_order_with_style() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    workspace.insert_blank().await;

    let mut first = TextOverlay::new("First").at(50.0, 50.0);
    first.color_hex = "#FF0000".to_string();
    first.opacity = 0.5;
    let mut second = TextOverlay::new("(Second)").at(10.0, 90.0);
    second.font = StandardFont::TimesRoman;
    workspace
        .add_text_overlay(&PageTarget::All, first)
        .await
        .unwrap();
    workspace
        .add_text_overlay(&PageTarget::All, second)
        .await
        .unwrap();

    let doc = export_preview(&workspace).await;
    let page_id = output_pages(&doc)[0];
    let content = page_content(&doc, page_id);

    let first_at = content.find("(First) Tj").unwrap();
    let second_at = content.find("(\\(Second\\)) Tj").unwrap();
    assert!(first_at < second_at);
    assert!(content.contains("1.0000 0.0000 0.0000 rg"));

    let resources = doc
        .get_dictionary(page_id)
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap();
    let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
    assert!(fonts.has(b"PcHelv"));
    assert!(fonts.has(b"PcTiRo"));
    assert_eq!(resources.get(b"ExtGState").unwrap().as_dict().unwrap().len(), 2);
}

#[tokio::test]
async fn test_corrupt_image_aborts_export() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    workspace.insert_blank().await;
    workspace
        .add_files(vec![IncomingFile::new(
            "broken.png",
            "image/png",
            b"\x89PNG\r\n\x1a\ntruncated".to_vec(),
        )])
        .await;
    assert_eq!(workspace.pages().len(), 2);

    let err = workspace.export(&ExportMode::Preview).await.unwrap_err();
    match err {
        ComposeError::Export {
            page, source_name, ..
        } => {
            assert_eq!(page, 2);
            assert_eq!(source_name, "broken.png");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The workspace is untouched
    assert_eq!(workspace.pages().len(), 2);
}

#[tokio::test]
async fn test_empty_workspace_has_nothing_to_export() {
    let workspace = Workspace::new(ComposeOptions::default());
    assert!(matches!(
        workspace.export(&ExportMode::Preview).await,
        Err(ComposeError::NoPages)
    ));
}

#[tokio::test]
async fn test_download_export_writes_sanitized_file() {
    let mut workspace = Workspace::new(ComposeOptions::default());
    workspace.insert_blank().await;

    let artifact = workspace
        .export(&ExportMode::Download {
            file_name: Some("Q3: report?.pdf".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(artifact.file_name.as_deref(), Some("Q3 report.pdf"));

    let dir = tempfile::tempdir().unwrap();
    let path = artifact.write_to(dir.path()).await.unwrap();
    assert_eq!(path, dir.path().join("Q3 report.pdf"));
    let written = tokio::fs::read(&path).await.unwrap();
    assert_eq!(Document::load_mem(&written).unwrap().get_pages().len(), 1);

    let artifact = workspace
        .export(&ExportMode::Download { file_name: None })
        .await
        .unwrap();
    assert_eq!(artifact.file_name.as_deref(), Some("document.pdf"));
}

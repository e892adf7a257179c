use foodgram_api::{
    pdf::{BodyFont, FILENAME, layout, render_shopping_list},
    shopping_list::{CartIngredientRow, ShoppingList},
};

fn sample_list(count: usize) -> ShoppingList {
    ShoppingList::aggregate((0..count).map(|i| CartIngredientRow {
        name: format!("ингредиент {i:02}"),
        measurement_unit: "г".into(),
        amount: 10,
    }))
}

#[test]
fn renders_a_pdf_with_a_real_font() -> anyhow::Result<()> {
    let Ok(path) = std::env::var("TEST_FONT_PATH") else {
        eprintln!("Skipping test: set TEST_FONT_PATH to a Cyrillic-capable TTF to render PDFs.");
        return Ok(());
    };
    let font = BodyFont::load(std::path::Path::new(&path))?;

    let list = sample_list(30);
    assert_eq!(layout(&list).len(), 2);

    let bytes = render_shopping_list(&list, &font)?;
    assert!(bytes.starts_with(b"%PDF"));
    Ok(())
}

#[test]
fn attachment_name_is_stable() {
    assert_eq!(FILENAME, "foodgram.pdf");
}

#[test]
fn garbage_font_is_rejected() {
    assert!(BodyFont::from_bytes(b"not a font".to_vec()).is_err());
}

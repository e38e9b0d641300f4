//! # dymoprint
//!
//! Print labels on a DYMO LabelManager.
//!
//! ```bash
//! # Two lines of text in a frame
//! dymoprint -f "Hello" "World"
//!
//! # A QR code next to a caption
//! dymoprint --qr "https://example.com" "scan me"
//!
//! # Look at the label without printing
//! dymoprint --preview -c code128 "ABC-123"
//! ```
//!
//! `DYMOPRINT_DEV_NODE` and the `DYMOPRINT_FONT_*` variables may also be set
//! in a `.env` file.

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use dymo_label::{
    compose, font_path, preview, rotate, select_transport, to_matrix, DeviceConfig, Error,
    FontStyle, LabelRequest, LibUsb, PrintSession, Symbology, Transport, TrueTypeFace,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Style {
    #[value(name = "r")]
    Regular,
    #[value(name = "b")]
    Bold,
    #[value(name = "i")]
    Italic,
    #[value(name = "n")]
    Narrow,
}

impl From<Style> for FontStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Regular => FontStyle::Regular,
            Style::Bold => FontStyle::Bold,
            Style::Italic => FontStyle::Italic,
            Style::Narrow => FontStyle::Narrow,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Barcode {
    Code39,
    Code128,
    Ean,
    Ean13,
    Ean8,
    Jan,
    Gtin,
    Upc,
    Upca,
    Gs1,
    Isbn,
    Isbn10,
    Isbn13,
    Issn,
    Pzn,
}

impl From<Barcode> for Symbology {
    fn from(barcode: Barcode) -> Self {
        match barcode {
            Barcode::Code39 => Symbology::Code39,
            Barcode::Code128 => Symbology::Code128,
            Barcode::Ean => Symbology::Ean,
            Barcode::Ean13 => Symbology::Ean13,
            Barcode::Ean8 => Symbology::Ean8,
            Barcode::Jan => Symbology::Jan,
            Barcode::Gtin => Symbology::Gtin,
            Barcode::Upc => Symbology::Upc,
            Barcode::Upca => Symbology::Upca,
            Barcode::Gs1 => Symbology::Gs1,
            Barcode::Isbn => Symbology::Isbn,
            Barcode::Isbn10 => Symbology::Isbn10,
            Barcode::Isbn13 => Symbology::Isbn13,
            Barcode::Issn => Symbology::Issn,
            Barcode::Pzn => Symbology::Pzn,
        }
    }
}

/// Print labels on a DYMO LabelManager
#[derive(Parser, Debug)]
#[command(name = "dymoprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Text, each argument gives a new line
    #[arg(required = true)]
    text: Vec<String>,

    /// Draw a frame around the text, repeat for a thicker frame
    #[arg(short = 'f', action = ArgAction::Count)]
    frame: u8,

    /// Font style (regular, bold, italic, narrow)
    #[arg(short = 's', value_enum, default_value = "r")]
    style: Style,

    /// User font file, overrides -s
    #[arg(short = 'u', value_name = "FONT")]
    user_font: Option<PathBuf>,

    /// Unicode preview of the label, do not send to printer
    #[arg(short = 'n', long)]
    preview: bool,

    /// Unicode preview of the label, colors inverted, do not send to printer
    #[arg(long)]
    preview_inverted: bool,

    /// Preview the label with ImageMagick, do not send to printer
    #[arg(long)]
    imagemagick: bool,

    /// Print the first text argument as a QR code
    #[arg(long)]
    qr: bool,

    /// Print the first text argument as a barcode
    #[arg(short = 'c', value_enum, value_name = "SYMBOLOGY")]
    barcode: Option<Barcode>,

    /// Print the given picture
    #[arg(short = 'p', long)]
    picture: Option<PathBuf>,

    /// Override the margin (default is 56*2)
    #[arg(short = 'm')]
    margin: Option<u32>,

    /// Printer device node, e.g. /dev/hidraw0
    #[arg(long, value_name = "PATH")]
    device: Option<PathBuf>,
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_default_env().init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let mut config = DeviceConfig::from_env();
    if let Some(device) = cli.device {
        config = config.node(device);
    }

    let font = font_path(cli.style.into(), cli.user_font.as_deref())?;

    let request = LabelRequest {
        text: cli.text,
        frame: cli.frame,
        qr: cli.qr,
        barcode: cli.barcode.map(Symbology::from),
        picture: cli.picture,
    };
    let bitmaps = request.render(config.label_height(), || TrueTypeFace::open(&font))?;
    let label = compose(bitmaps)?;
    let matrix = to_matrix(&label)?;

    if cli.preview || cli.preview_inverted || cli.imagemagick {
        println!("Demo mode: showing label..");
        if cli.preview || cli.preview_inverted {
            print!("{}", preview::to_unicode(&rotate(&label), cli.preview_inverted));
        }
        if cli.imagemagick {
            preview::show_with_imagemagick(&label)?;
        }
        return Ok(());
    }

    let transport = select_transport(&config, &LibUsb)?;
    if let Transport::Usb(_) = transport {
        println!("Entering raw USB mode.");
    }
    println!("Printing label..");
    PrintSession::new(transport).print(&matrix, cli.margin)
}

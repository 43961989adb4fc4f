use std::fmt;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};
use tracing::{debug, info};

use crate::{
    collage::layout::{CollagePlan, PanelSize},
    config::Config,
    error::{Result, VideoError},
    video::{self, resize_area, FfmpegSink, FfmpegSource, Frame, FrameSink, FrameSource},
};

/// Builds one side-by-side comparison video out of three inputs
///
/// The run is a single sequential pass:
/// 1. Check the three inputs exist
/// 2. Read the properties of each input
/// 3. Fix output rate, panel sizes and frame size
/// 4. Start a decoder per input, scaling to its panel size
/// 5. Open the encoder
/// 6. Stack one frame from each source per output frame until all are exhausted
pub struct CollageBuilder {
    config: Config,
}

impl CollageBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Render `inputs` left to right into `output`
    pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(&self, inputs: [P; 3], output: Q) -> Result<CollageSummary> {
        let output = output.as_ref();
        self.config.validate()?;

        let missing: Vec<String> = inputs
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| !p.exists())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(VideoError::InputsMissing { paths: missing }.into());
        }

        video::ensure_tool(video::FFPROBE)?;
        video::ensure_tool(video::FFMPEG)?;

        info!("🎬 Building collage");
        for (i, input) in inputs.iter().enumerate() {
            info!("   Panel {}: {:?}", i + 1, input.as_ref());
        }
        info!("   Output: {:?}", output);

        let [first, second, third] = inputs;
        let properties = [
            FfmpegSource::inspect(&first)?,
            FfmpegSource::inspect(&second)?,
            FfmpegSource::inspect(&third)?,
        ];

        let plan = CollagePlan::new(&properties, &self.config)?;
        info!("   Resolution: {}x{} @ {:.3} fps", plan.width, plan.height, plan.fps);

        // Any source opened before a later one fails is released on drop
        let open = |path: &P, i: usize| {
            FfmpegSource::open(path, properties[i], plan.panels[i].width, plan.panels[i].height)
        };
        let mut sources = [open(&first, 0)?, open(&second, 1)?, open(&third, 2)?];

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut sink = FfmpegSink::open(output, &self.config.output.codec, plan.width, plan.height, plan.fps)?;
        let frames_written = render(&mut sources, &plan, &mut sink)?;

        sink.finish()?;
        drop(sources);

        info!("🎉 Collage complete: {} frames written to {:?}", frames_written, output);

        Ok(CollageSummary {
            output: output.to_path_buf(),
            frames_written,
            width: plan.width,
            height: plan.height,
            fps: plan.fps,
            input_frame_counts: properties.map(|p| p.frame_count),
        })
    }
}

/// Drive the frame loop until every source is exhausted.
///
/// A source that runs out is shown as a solid `pad_color` panel for as long
/// as any other source still has frames. Returns the number of frames
/// handed to `sink`.
pub fn render<S: FrameSource, K: FrameSink>(
    sources: &mut [S; 3],
    plan: &CollagePlan,
    sink: &mut K,
) -> Result<u64> {
    let mut done = [false; 3];
    let mut frames_written = 0u64;

    loop {
        let mut panels: [Option<Frame>; 3] = [None, None, None];
        for (i, source) in sources.iter_mut().enumerate() {
            if !done[i] {
                panels[i] = read_normalized(source, plan.panels[i])?;
            }
            if panels[i].is_none() {
                if !done[i] {
                    debug!("Source {} exhausted after {} frames", i + 1, frames_written);
                }
                done[i] = true;
            }
        }

        if done.iter().all(|&d| d) {
            break;
        }

        let panels = panels
            .into_iter()
            .zip(plan.panels)
            .map(|(panel, size)| {
                panel.unwrap_or_else(|| Frame::new_filled(size.width, size.height, plan.pad_color))
            });
        let row = compose_row(panels, plan);

        sink.write_frame(&row)?;
        frames_written += 1;

        if frames_written % 500 == 0 {
            debug!("{} frames written", frames_written);
        }
    }

    Ok(frames_written)
}

/// Read the next frame and bring it to the panel size
fn read_normalized<S: FrameSource>(source: &mut S, panel: PanelSize) -> Result<Option<Frame>> {
    let Some(frame) = source.read_frame()? else {
        return Ok(None);
    };
    if frame.dimensions() == (panel.width, panel.height) {
        Ok(Some(frame))
    } else {
        Ok(Some(resize_area(&frame, panel.width, panel.height)))
    }
}

/// Lay the panels out left to right with `pad_px` separators between them
pub fn compose_row(panels: impl IntoIterator<Item = Frame>, plan: &CollagePlan) -> Frame {
    let mut canvas = ImageBuffer::from_pixel(plan.width, plan.height, Rgb(plan.pad_color.0));

    for (panel, x) in panels.into_iter().zip(plan.panel_offsets()) {
        image::imageops::replace(&mut canvas, panel.as_image(), x as i64, 0);
    }

    Frame::new(canvas)
}

/// What a finished run produced
#[derive(Debug, Clone, PartialEq)]
pub struct CollageSummary {
    pub output: PathBuf,
    pub frames_written: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame counts the inputs reported when opened; informational only
    pub input_frame_counts: [i64; 3],
}

impl fmt::Display for CollageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n1, n2, n3] = self.input_frame_counts;
        writeln!(f, "✅ Collage complete!")?;
        writeln!(f, "Output: {}", self.output.display())?;
        writeln!(f, "Frames written: {}", self.frames_written)?;
        writeln!(f, "Resolution: {}x{} @ {:.3} fps", self.width, self.height, self.fps)?;
        write!(f, "Inputs frame counts: {}, {}, {}", n1, n2, n3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::video::{PadColor, VideoProperties};
    use tempfile::tempdir;

    const RED: PadColor = PadColor([200, 0, 0]);
    const GREEN: PadColor = PadColor([0, 200, 0]);
    const BLUE: PadColor = PadColor([0, 0, 200]);
    const GREY: PadColor = PadColor([90, 90, 90]);

    /// In-memory source yielding `count` solid frames of one color
    struct SolidSource {
        properties: VideoProperties,
        frames: VecDeque<Frame>,
    }

    impl SolidSource {
        fn new(width: u32, height: u32, fps: f64, count: usize, color: PadColor) -> Self {
            Self {
                properties: VideoProperties { fps, width, height, frame_count: count as i64 },
                frames: (0..count).map(|_| Frame::new_filled(width, height, color)).collect(),
            }
        }

        fn with_frames(properties: VideoProperties, frames: Vec<Frame>) -> Self {
            Self { properties, frames: frames.into() }
        }
    }

    impl FrameSource for SolidSource {
        fn properties(&self) -> VideoProperties {
            self.properties
        }

        fn read_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.frames.pop_front())
        }
    }

    /// Source that cannot be decoded at all
    struct UndecodableSource(VideoProperties);

    impl FrameSource for UndecodableSource {
        fn properties(&self) -> VideoProperties {
            self.0
        }

        fn read_frame(&mut self) -> Result<Option<Frame>> {
            Err(VideoError::DecodingFailed { reason: "Unrecognized option".to_string() }.into())
        }
    }

    /// Sink that keeps every frame and enforces a fixed frame size
    struct RecordingSink {
        size: (u32, u32),
        frames: Vec<Frame>,
    }

    impl RecordingSink {
        fn for_plan(plan: &CollagePlan) -> Self {
            Self { size: (plan.width, plan.height), frames: Vec::new() }
        }
    }

    impl FrameSink for RecordingSink {
        fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            assert_eq!(frame.dimensions(), self.size, "frame size changed mid-stream");
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    fn run(sources: [SolidSource; 3], config: &Config) -> (CollagePlan, RecordingSink, u64) {
        let mut sources = sources;
        let plan = CollagePlan::new(&sources.each_ref().map(|s| s.properties()), config).unwrap();
        let mut sink = RecordingSink::for_plan(&plan);
        let written = render(&mut sources, &plan, &mut sink).unwrap();
        (plan, sink, written)
    }

    #[test]
    fn test_equal_sources_with_padding() {
        let mut config = Config::default();
        config.layout.target_height = Some(360);
        config.layout.pad_px = 12;

        let (plan, sink, written) = run(
            [
                SolidSource::new(640, 360, 30.0, 10, RED),
                SolidSource::new(640, 360, 30.0, 10, GREEN),
                SolidSource::new(640, 360, 30.0, 10, BLUE),
            ],
            &config,
        );

        assert_eq!(written, 10);
        assert_eq!(sink.frames.len(), 10);
        assert_eq!((plan.width, plan.height, plan.fps), (1944, 360, 30.0));

        for frame in &sink.frames {
            assert_eq!(frame.get_pixel(0, 0), RED.0);
            assert_eq!(frame.get_pixel(639, 359), RED.0);
            assert_eq!(frame.get_pixel(640, 100), PadColor::BLACK.0);
            assert_eq!(frame.get_pixel(651, 100), PadColor::BLACK.0);
            assert_eq!(frame.get_pixel(652, 100), GREEN.0);
            assert_eq!(frame.get_pixel(1292, 100), PadColor::BLACK.0);
            assert_eq!(frame.get_pixel(1304, 100), BLUE.0);
            assert_eq!(frame.get_pixel(1943, 359), BLUE.0);
        }
    }

    #[test]
    fn test_shorter_sources_are_filled_until_longest_ends() {
        let mut config = Config::default();
        config.layout.pad_color = GREY;
        config.layout.pad_px = 4;

        let (plan, sink, written) = run(
            [
                SolidSource::new(320, 240, 25.0, 3, RED),
                SolidSource::new(320, 240, 25.0, 5, GREEN),
                SolidSource::new(320, 240, 25.0, 2, BLUE),
            ],
            &config,
        );

        assert_eq!(written, 5);
        let [x1, x2, x3] = plan.panel_offsets();

        for (i, frame) in sink.frames.iter().enumerate() {
            let expect = |len: usize, color: PadColor| if i < len { color.0 } else { GREY.0 };
            assert_eq!(frame.get_pixel(x1 + 10, 10), expect(3, RED), "frame {}", i);
            assert_eq!(frame.get_pixel(x2 + 10, 10), expect(5, GREEN), "frame {}", i);
            assert_eq!(frame.get_pixel(x3 + 10, 10), expect(2, BLUE), "frame {}", i);
        }
    }

    #[test]
    fn test_no_padding_means_adjacent_panels() {
        let (plan, sink, written) = run(
            [
                SolidSource::new(100, 50, 30.0, 2, RED),
                SolidSource::new(100, 50, 30.0, 2, GREEN),
                SolidSource::new(100, 50, 30.0, 2, BLUE),
            ],
            &Config::default(),
        );

        assert_eq!(written, 2);
        assert_eq!(plan.width, 300);
        let frame = &sink.frames[0];
        assert_eq!(frame.get_pixel(99, 0), RED.0);
        assert_eq!(frame.get_pixel(100, 0), GREEN.0);
        assert_eq!(frame.get_pixel(199, 0), GREEN.0);
        assert_eq!(frame.get_pixel(200, 0), BLUE.0);
    }

    #[test]
    fn test_sources_are_scaled_to_common_height() {
        let (plan, sink, written) = run(
            [
                SolidSource::new(1280, 720, 60.0, 1, RED),
                SolidSource::new(640, 360, 24.0, 1, GREEN),
                SolidSource::new(480, 360, 30.0, 1, BLUE),
            ],
            &Config::default(),
        );

        assert_eq!(written, 1);
        assert_eq!(plan.fps, 24.0);
        assert_eq!(plan.height, 360);
        assert_eq!(plan.panels.map(|p| p.width), [640, 640, 480]);
        assert_eq!((plan.width, plan.height), (1760, 360));

        let frame = &sink.frames[0];
        assert_eq!(frame.get_pixel(639, 359), RED.0);
        assert_eq!(frame.get_pixel(640, 0), GREEN.0);
        assert_eq!(frame.get_pixel(1759, 359), BLUE.0);
    }

    #[test]
    fn test_frame_with_unexpected_size_is_resized() {
        let properties = VideoProperties { fps: 30.0, width: 64, height: 32, frame_count: 2 };
        let odd = SolidSource::with_frames(
            properties,
            vec![Frame::new_filled(64, 32, RED), Frame::new_filled(30, 30, RED)],
        );

        let (_, sink, written) = run(
            [
                odd,
                SolidSource::new(64, 32, 30.0, 2, GREEN),
                SolidSource::new(64, 32, 30.0, 2, BLUE),
            ],
            &Config::default(),
        );

        assert_eq!(written, 2);
        assert_eq!(sink.frames[1].get_pixel(63, 31), RED.0);
        assert_eq!(sink.frames[1].get_pixel(64, 0), GREEN.0);
    }

    #[test]
    fn test_undecodable_source_fails_the_run() {
        let properties = VideoProperties { fps: 30.0, width: 64, height: 32, frame_count: 5 };
        let mut sources = [
            UndecodableSource(properties),
            UndecodableSource(properties),
            UndecodableSource(properties),
        ];
        let plan = CollagePlan::new(&[properties; 3], &Config::default()).unwrap();
        let mut sink = RecordingSink::for_plan(&plan);

        let err = render(&mut sources, &plan, &mut sink).unwrap_err();

        assert!(matches!(err, crate::CollageError::Video(VideoError::DecodingFailed { .. })));
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_all_empty_sources_write_nothing() {
        let (_, sink, written) = run(
            [
                SolidSource::new(64, 32, 30.0, 0, RED),
                SolidSource::new(64, 32, 30.0, 0, GREEN),
                SolidSource::new(64, 32, 30.0, 0, BLUE),
            ],
            &Config::default(),
        );

        assert_eq!(written, 0);
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_rendering_is_repeatable() {
        let make = || {
            [
                SolidSource::new(160, 90, 30.0, 4, RED),
                SolidSource::new(320, 180, 30.0, 6, GREEN),
                SolidSource::new(90, 90, 30.0, 1, BLUE),
            ]
        };
        let config = Config::default();

        let (plan_a, sink_a, written_a) = run(make(), &config);
        let (plan_b, sink_b, written_b) = run(make(), &config);

        assert_eq!(plan_a, plan_b);
        assert_eq!(written_a, written_b);
        assert_eq!(sink_a.frames, sink_b.frames);
    }

    #[test]
    fn test_missing_input_fails_before_output_exists() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present.mp4");
        std::fs::write(&present, b"not really a video").unwrap();
        let output = dir.path().join("out").join("collage.mp4");

        let builder = CollageBuilder::new(Config::default());
        let err = builder
            .build([present.clone(), dir.path().join("missing.mp4"), present], &output)
            .unwrap_err();

        match err {
            crate::CollageError::Video(VideoError::InputsMissing { paths }) => {
                assert_eq!(paths.len(), 1);
                assert!(paths[0].ends_with("missing.mp4"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!output.exists());
        assert!(!output.parent().unwrap().exists());
    }

    #[test]
    fn test_summary_lines() {
        let summary = CollageSummary {
            output: PathBuf::from("out/gamevision.mp4"),
            frames_written: 10,
            width: 1944,
            height: 360,
            fps: 30.0,
            input_frame_counts: [10, 10, 9],
        };

        let text = summary.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "Output: out/gamevision.mp4");
        assert_eq!(lines[2], "Frames written: 10");
        assert_eq!(lines[3], "Resolution: 1944x360 @ 30.000 fps");
        assert_eq!(lines[4], "Inputs frame counts: 10, 10, 9");
    }

    /// Needs `ffmpeg`/`ffprobe` on PATH: `cargo test -- --ignored`
    #[test]
    #[ignore]
    fn test_end_to_end_with_ffmpeg() {
        let dir = tempdir().unwrap();
        let make_clip = |name: &str, frames: u32| {
            let path = dir.path().join(name);
            let status = std::process::Command::new("ffmpeg")
                .args(["-hide_banner", "-v", "error", "-y", "-f", "lavfi", "-i"])
                .arg("testsrc=size=640x360:rate=30")
                .args(["-frames:v", frames.to_string().as_str(), "-c:v", "mpeg4"])
                .arg(&path)
                .status()
                .unwrap();
            assert!(status.success());
            path
        };

        let inputs = [make_clip("a.mp4", 10), make_clip("b.mp4", 10), make_clip("c.mp4", 7)];
        let output = dir.path().join("nested").join("collage.mp4");

        let mut config = Config::default();
        config.layout.target_height = Some(360);
        config.layout.pad_px = 12;

        let summary = CollageBuilder::new(config).build(inputs, &output).unwrap();

        assert_eq!(summary.frames_written, 10);
        assert_eq!((summary.width, summary.height), (1944, 360));
        assert_eq!(summary.fps, 30.0);

        let props = FfmpegSource::inspect(&output).unwrap();
        assert_eq!((props.width, props.height), (1944, 360));
        assert_eq!(props.frame_count, 10);
    }
}

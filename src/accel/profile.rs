use indexmap::IndexMap;

/// Hardware backends in probing priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Cuda,
    Qsv,
    Vaapi,
}

impl Backend {
    pub const PRIORITY: [Backend; 3] = [Self::Cuda, Self::Qsv, Self::Vaapi];

    /// Name as listed by `ffmpeg -hwaccels` and accepted by `-hwaccel`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::Qsv => "qsv",
            Self::Vaapi => "vaapi",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(name))
    }

    /// Built-in profile for this backend.
    pub fn profile(self) -> AcceleratorProfile {
        let scale_renames = [("width", "w"), ("height", "h")];
        match self {
            Self::Cuda => AcceleratorProfile::new("cuda", "h264_nvenc")
                .map_filter("scale", "scale_cuda", &scale_renames)
                .map_filter("overlay", "overlay_cuda", &[])
                .map_filter("yadif", "yadif_cuda", &[])
                .map_filter("hwupload", "hwupload_cuda", &[])
                .with_hwaccel("cuda"),
            Self::Qsv => AcceleratorProfile::new("qsv", "h264_qsv")
                .map_filter("scale", "scale_qsv", &scale_renames)
                .map_filter("overlay", "overlay_qsv", &[])
                .map_filter("deinterlace", "deinterlace_qsv", &[])
                .with_hwaccel("qsv"),
            Self::Vaapi => AcceleratorProfile::new("vaapi", "h264_vaapi")
                .map_filter("scale", "scale_vaapi", &scale_renames)
                .map_filter("overlay", "overlay_vaapi", &[])
                .map_filter("deinterlace", "deinterlace_vaapi", &[])
                .with_hwaccel("vaapi"),
        }
    }
}

/// Where one software filter goes on a vendor backend.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterMapping {
    pub vendor_impl: String,
    /// Software parameter name → vendor parameter name. Unlisted keys pass through.
    #[serde(default)]
    pub param_renames: IndexMap<String, String>,
}

/// Capabilities of one hardware target, handed to the rewriter as an immutable value.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceleratorProfile {
    pub name: String,
    #[serde(default)]
    pub supported_filters: IndexMap<String, FilterMapping>,
    pub video_codec: String,
    /// Value for `-hwaccel`, inserted when the command does not choose one itself.
    #[serde(default)]
    pub hwaccel: Option<String>,
}

impl AcceleratorProfile {
    pub fn new(name: impl Into<String>, video_codec: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supported_filters: IndexMap::new(),
            video_codec: video_codec.into(),
            hwaccel: None,
        }
    }

    pub fn map_filter(mut self, filter: &str, vendor_impl: &str, renames: &[(&str, &str)]) -> Self {
        self.supported_filters.insert(
            filter.to_owned(),
            FilterMapping {
                vendor_impl: vendor_impl.to_owned(),
                param_renames: renames
                    .iter()
                    .map(|(from, to)| ((*from).to_owned(), (*to).to_owned()))
                    .collect(),
            },
        );
        self
    }

    pub fn with_hwaccel(mut self, hwaccel: impl Into<String>) -> Self {
        self.hwaccel = Some(hwaccel.into());
        self
    }

    pub fn mapping(&self, filter: &str) -> Option<&FilterMapping> {
        self.supported_filters.get(filter)
    }
}

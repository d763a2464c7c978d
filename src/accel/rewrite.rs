use indexmap::IndexMap;

use crate::accel::profile::AcceleratorProfile;
use crate::command::ir::{FilterApplication, ParsedCommand, VIDEO_CODEC_KEYS};

/// What a rewrite changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RewriteReport {
    pub profile: String,
    /// `(software filter, vendor filter)` per retargeted application.
    pub retargeted: Vec<(String, String)>,
    /// Filters the profile has no implementation for; they stay on the CPU.
    pub fallbacks: Vec<String>,
    /// Outputs whose video encoder was replaced.
    pub codec_changes: usize,
    pub hwaccel_inserted: bool,
}

impl RewriteReport {
    pub fn changed(&self) -> bool {
        !self.retargeted.is_empty() || self.codec_changes > 0 || self.hwaccel_inserted
    }
}

/// Retargets `cmd` to `profile`, returning a new command.
///
/// Only filter names, parameter keys, video encoders and `-hwaccel` change. Labels, chain order
/// and the input/output structure are preserved, so label and cycle checks give the same answer
/// before and after. Parameter ranges must be checked before calling this.
#[tracing::instrument(skip_all, fields(profile = %profile.name))]
pub fn rewrite(
    cmd: &ParsedCommand,
    profile: &AcceleratorProfile,
) -> (ParsedCommand, RewriteReport) {
    let mut out = cmd.clone();
    let mut report = RewriteReport {
        profile: profile.name.clone(),
        ..RewriteReport::default()
    };

    for app in out.chains.iter_mut().flat_map(|c| c.applications.iter_mut()) {
        match profile.mapping(&app.name) {
            Some(mapping) => {
                let from = std::mem::replace(&mut app.name, mapping.vendor_impl.clone());
                rename_params(app, &mapping.param_renames);
                tracing::debug!(from = %from, to = %app.name, "retargeted filter");
                report.retargeted.push((from, app.name.clone()));
            }
            None => {
                if !report.fallbacks.contains(&app.name) {
                    tracing::debug!(filter = %app.name, "no vendor filter; software fallback");
                    report.fallbacks.push(app.name.clone());
                }
            }
        }
    }

    for output in &mut out.outputs {
        let mut changed = false;
        for key in VIDEO_CODEC_KEYS {
            if let Some(codec) = output.codec_options.get_mut(key)
                && codec.as_str() != "copy"
                && codec.as_str() != profile.video_codec
            {
                *codec = profile.video_codec.clone();
                changed = true;
            }
        }
        if changed {
            report.codec_changes += 1;
        }
    }

    if let Some(hwaccel) = &profile.hwaccel
        && (!report.retargeted.is_empty() || report.codec_changes > 0)
        && !out.global_options.contains_key("hwaccel")
    {
        out.global_options.insert("hwaccel".to_owned(), hwaccel.clone());
        report.hwaccel_inserted = true;
    }

    (out, report)
}

// Keeps parameter order; a rename landing on an existing key keeps the earlier value.
fn rename_params(app: &mut FilterApplication, renames: &IndexMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    let mut params = IndexMap::with_capacity(app.params.len());
    for (key, value) in std::mem::take(&mut app.params) {
        let key = renames.get(&key).cloned().unwrap_or(key);
        params.entry(key).or_insert(value);
    }
    app.params = params;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::profile::Backend;
    use crate::command::parser::parse_command;
    use crate::registry::FilterRegistry;

    fn parse(src: &str) -> ParsedCommand {
        parse_command(src, &FilterRegistry::builtin()).unwrap()
    }

    #[test]
    fn renames_filters_and_params() {
        let cmd = parse(
            "-i a.mp4 -filter_complex \"[0:v]scale=1280:720,eq=contrast=1.2[v]\" -map [v] -c:v libx264 out.mp4",
        );
        let (out, report) = rewrite(&cmd, &Backend::Cuda.profile());
        let apps = &out.chains[0].applications;
        assert_eq!(apps[0].name, "scale_cuda");
        assert_eq!(apps[0].param("w"), Some("1280"));
        assert_eq!(apps[0].param("h"), Some("720"));
        assert_eq!(apps[0].params.keys().collect::<Vec<_>>(), vec!["w", "h"]);
        assert_eq!(apps[1].name, "eq");
        assert_eq!(report.retargeted, vec![("scale".to_owned(), "scale_cuda".to_owned())]);
        assert_eq!(report.fallbacks, vec!["eq"]);
        assert_eq!(out.outputs[0].video_codec(), Some("h264_nvenc"));
        assert_eq!(report.codec_changes, 1);
        assert_eq!(out.global_options.get("hwaccel").map(String::as_str), Some("cuda"));
        assert!(report.hwaccel_inserted);
    }

    #[test]
    fn structure_is_untouched() {
        let cmd = parse("[0:v]scale=640:360[a];[a][1:v]overlay=x=5[out]");
        let (out, _) = rewrite(&cmd, &Backend::Qsv.profile());
        assert_eq!(out.chains.len(), cmd.chains.len());
        for (a, b) in out.chains.iter().zip(&cmd.chains) {
            assert_eq!(a.inputs, b.inputs);
            assert_eq!(a.output, b.output);
        }
        assert_eq!(out.chains[1].applications[0].name, "overlay_qsv");
        assert_eq!(out.chains[1].applications[0].param("x"), Some("5"));
    }

    #[test]
    fn stream_copy_and_existing_hwaccel_are_kept() {
        let cmd = parse("-hwaccel vaapi -i a.mp4 -c:v copy -c:a aac out.mp4");
        let (out, report) = rewrite(&cmd, &Backend::Cuda.profile());
        assert_eq!(out.outputs[0].video_codec(), Some("copy"));
        assert_eq!(report.codec_changes, 0);
        assert!(!report.hwaccel_inserted);
        assert!(!report.changed());
        assert_eq!(out, cmd);
    }

    #[test]
    fn outputs_without_video_codec_stay_as_is() {
        let cmd = parse("-i a.mp4 -filter_complex \"[0:v]hflip[v]\" -map [v] out.mp4");
        let (out, report) = rewrite(&cmd, &Backend::Vaapi.profile());
        assert!(out.outputs[0].codec_options.is_empty());
        assert_eq!(report.fallbacks, vec!["hflip"]);
        assert!(!out.global_options.contains_key("hwaccel"));
    }
}

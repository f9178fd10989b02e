use crate::array::ConfigArray;
use crate::data::BindFallback;
use crate::data_model::{ConfigDataModel, DataModel};
use crate::file_model::{ConfigFileModel, FileModel};
use crate::log_source::LogSource;
use config_store::{ConfigFile, SettingValue};

/// Creates and binds models straight from a [`ConfigFile`].
///
/// The outcome of each bind is logged and kept in the returned model's
/// `last_report()`.
pub trait ConfigFileExt {
    fn bind_data_model<M: DataModel + Default>(
        &self,
        log: Option<&LogSource>,
        section: Option<&str>,
    ) -> ConfigDataModel<M>;

    /// Like [`bind_data_model`](Self::bind_data_model), with listeners
    /// registered for the model's whole life before the first bind.
    fn bind_data_model_with<M, Pre, Post>(
        &self,
        pre_bind: Pre,
        post_bind: Post,
        log: Option<&LogSource>,
        section: Option<&str>,
    ) -> ConfigDataModel<M>
    where
        M: DataModel + Default,
        Pre: Fn(&ConfigDataModel<M>) + Send + Sync + 'static,
        Post: Fn(&ConfigDataModel<M>) + Send + Sync + 'static;

    fn bind_file_model<M: FileModel + Default>(
        &self,
        log: Option<&LogSource>,
        section: Option<&str>,
    ) -> ConfigFileModel<M>;

    /// Binds `size` settings under `{key}_0` .. `{key}_{size - 1}`.
    fn bind_array<T: SettingValue>(
        &self,
        log: Option<&LogSource>,
        size: usize,
        section: &str,
        key: &str,
        description: &str,
        default_value: T,
    ) -> ConfigArray<T>;
}

impl ConfigFileExt for ConfigFile {
    fn bind_data_model<M: DataModel + Default>(
        &self,
        log: Option<&LogSource>,
        section: Option<&str>,
    ) -> ConfigDataModel<M> {
        let mut model = ConfigDataModel::<M>::default();
        model.bind_model(Some(self), section, log);
        model
    }

    fn bind_data_model_with<M, Pre, Post>(
        &self,
        pre_bind: Pre,
        post_bind: Post,
        log: Option<&LogSource>,
        section: Option<&str>,
    ) -> ConfigDataModel<M>
    where
        M: DataModel + Default,
        Pre: Fn(&ConfigDataModel<M>) + Send + Sync + 'static,
        Post: Fn(&ConfigDataModel<M>) + Send + Sync + 'static,
    {
        let mut model = ConfigDataModel::<M>::default();
        model.on_pre_bind(pre_bind).detach();
        model.on_post_bind(post_bind).detach();
        model.bind_model(Some(self), section, log);
        model
    }

    fn bind_file_model<M: FileModel + Default>(
        &self,
        log: Option<&LogSource>,
        section: Option<&str>,
    ) -> ConfigFileModel<M> {
        let mut model = ConfigFileModel::<M>::default();
        model.bind(Some(self), section, log);
        model
    }

    fn bind_array<T: SettingValue>(
        &self,
        log: Option<&LogSource>,
        size: usize,
        section: &str,
        key: &str,
        description: &str,
        default_value: T,
    ) -> ConfigArray<T> {
        let mut array = ConfigArray::new(size)
            .with_section(section)
            .with_key(key)
            .with_description(description)
            .with_default(default_value);
        if let Err(e) = array.bind(Some(self), log, BindFallback::default()) {
            log.cloned()
                .unwrap_or_default()
                .error(&format!("ConfigFileExt::bind_array | Failed to bind [{section}] {key}: {e}"));
        }
        array
    }
}

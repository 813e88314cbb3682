use std::collections::{HashMap, HashSet};

use crate::render::GpuBackend;

use super::error::{ShaderError, UniformError};
use super::uniform::{UniformKey, UniformLocation, UniformValue};
use super::variant::ShaderVariant;

/// A compiled program plus its resolved uniform locations.
///
/// Keeps a CPU shadow of the uniform block so the last value set for every
/// key can be read back without touching the GPU.
#[derive(Debug)]
pub struct CompiledProgram<P> {
    variant: ShaderVariant,
    handle: P,
    locations: HashMap<UniformKey, UniformLocation>,
    shadow: Vec<u8>,
}

impl<P: Copy> CompiledProgram<P> {
    fn new(variant: ShaderVariant, handle: P) -> Self {
        let info = variant.info();
        let locations = info
            .uniforms
            .iter()
            .map(|slot| (slot.key, slot.location()))
            .collect();

        Self {
            variant,
            handle,
            locations,
            shadow: vec![0; info.uniform_block_size as usize],
        }
    }

    #[inline]
    pub fn variant(&self) -> ShaderVariant {
        self.variant
    }

    /// Backend handle.
    #[inline]
    pub fn handle(&self) -> P {
        self.handle
    }

    #[inline]
    pub fn location(&self, key: UniformKey) -> Option<UniformLocation> {
        self.locations.get(&key).copied()
    }

    /// Last value set for `key` (zeroes if never set).
    pub fn uniform(&self, key: UniformKey) -> Option<UniformValue> {
        let location = self.location(key)?;
        UniformValue::read_from(location.kind, &self.shadow[location.byte_range()])
    }
}

/// Owns one compiled program per requested shader variant.
///
/// The program set is fixed at construction. Iteration order (and therefore
/// batch flush order) is the order in which variants were requested.
/// Programs are released through the backend when the cache is dropped.
pub struct ShaderCache<B: GpuBackend> {
    backend: B,
    programs: Vec<CompiledProgram<B::Program>>,
    slots: [Option<usize>; ShaderVariant::COUNT],
    bound: Option<ShaderVariant>,
    warned: HashSet<(ShaderVariant, UniformKey)>,
}

impl<B: GpuBackend> ShaderCache<B> {
    /// Compiles every requested variant.
    ///
    /// Repeated variants are compiled once. If any variant fails, programs
    /// built so far are released and the error is returned.
    pub fn new(mut backend: B, requested: &[ShaderVariant]) -> Result<Self, ShaderError> {
        let capacity = backend.transform_table_capacity();
        let mut programs: Vec<CompiledProgram<B::Program>> = Vec::with_capacity(requested.len());
        let mut slots = [None; ShaderVariant::COUNT];

        for &variant in requested {
            if slots[variant.index()].is_some() {
                log::debug!("shader variant `{variant}` requested more than once; compiling once");
                continue;
            }

            let source = variant.program_source(capacity);
            let handle = match backend.compile_program(&source) {
                Ok(handle) => handle,
                Err(err) => {
                    log::error!("{err}");
                    for program in programs.drain(..) {
                        backend.release_program(program.handle);
                    }
                    return Err(err);
                }
            };

            log::info!("compiled shader variant `{variant}`");
            slots[variant.index()] = Some(programs.len());
            programs.push(CompiledProgram::new(variant, handle));
        }

        Ok(Self {
            backend,
            programs,
            slots,
            bound: None,
            warned: HashSet::new(),
        })
    }

    /// Variants in construction order.
    pub fn variants(&self) -> impl Iterator<Item = ShaderVariant> + '_ {
        self.programs.iter().map(|p| p.variant)
    }

    #[inline]
    pub fn contains(&self, variant: ShaderVariant) -> bool {
        self.slots[variant.index()].is_some()
    }

    /// Returns the compiled program for `variant`.
    pub fn get_program(
        &self,
        variant: ShaderVariant,
    ) -> Result<&CompiledProgram<B::Program>, ShaderError> {
        self.slots[variant.index()]
            .map(|i| &self.programs[i])
            .ok_or(ShaderError::VariantNotRequested(variant))
    }

    /// Binds `variant`'s program. No backend call if it is already bound.
    pub fn use_program(&mut self, variant: ShaderVariant) -> Result<(), ShaderError> {
        let handle = self.get_program(variant)?.handle;
        if self.bound == Some(variant) {
            return Ok(());
        }
        self.backend.bind_program(handle);
        self.bound = Some(variant);
        Ok(())
    }

    /// Variant whose program is currently bound.
    #[inline]
    pub fn bound(&self) -> Option<ShaderVariant> {
        self.bound
    }

    /// Resolves `key` for `variant` and uploads `value`.
    ///
    /// Errors are recoverable: they are logged and the upload is skipped.
    /// Each (variant, key) pair warns once; repeats are logged at debug.
    pub fn set_uniform(
        &mut self,
        variant: ShaderVariant,
        key: UniformKey,
        value: impl Into<UniformValue>,
    ) -> Result<(), UniformError> {
        let value = value.into();

        let Some(index) = self.slots[variant.index()] else {
            let err = UniformError::VariantNotRequested(variant);
            log::error!("set_uniform: {err}");
            return Err(err);
        };

        let program = &mut self.programs[index];
        let result = match program.locations.get(&key).copied() {
            None => Err(UniformError::Missing { variant, key }),
            Some(location) if location.kind != value.kind() => Err(UniformError::TypeMismatch {
                variant,
                key,
                expected: location.kind,
                found: value.kind(),
            }),
            Some(location) => {
                let range = location.byte_range();
                value.write_to(&mut program.shadow[range.clone()]);
                self.backend
                    .write_uniform(program.handle, location, &program.shadow[range]);
                Ok(())
            }
        };

        if let Err(err) = &result {
            if self.warned.insert((variant, key)) {
                log::warn!("skipping uniform upload: {err}");
            } else {
                log::debug!("skipping uniform upload: {err}");
            }
        }
        result
    }

    /// Last value set for `key` on `variant`, read from the CPU shadow.
    pub fn uniform(&self, variant: ShaderVariant, key: UniformKey) -> Option<UniformValue> {
        self.get_program(variant).ok()?.uniform(key)
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: GpuBackend> Drop for ShaderCache<B> {
    fn drop(&mut self) {
        for program in self.programs.drain(..) {
            self.backend.release_program(program.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::{GpuCall, RecordingBackend};
    use crate::shader::UniformKind;
    use glam::{Mat4, Vec3};

    const LIT: ShaderVariant = ShaderVariant::AtlasTransformTableAmbientDiffuse;
    const UNLIT: ShaderVariant = ShaderVariant::AtlasTransformTable;

    fn cache(variants: &[ShaderVariant]) -> ShaderCache<RecordingBackend> {
        ShaderCache::new(RecordingBackend::new(), variants).unwrap()
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn compiles_each_requested_variant_once() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let cache = ShaderCache::new(backend, &[LIT, UNLIT, LIT]).unwrap();

        assert_eq!(cache.variants().collect::<Vec<_>>(), vec![LIT, UNLIT]);
        let compiles = log
            .borrow()
            .calls()
            .iter()
            .filter(|c| matches!(c, GpuCall::Compile(_)))
            .count();
        assert_eq!(compiles, 2);

        let lit = cache.get_program(LIT).unwrap().handle();
        assert_eq!(log.borrow().variant_of(lit), Some(LIT));
    }

    #[test]
    fn compile_failure_fails_whole_cache_and_releases_built_programs() {
        let backend = RecordingBackend::new().failing_on(UNLIT);
        let log = backend.log();

        let err = ShaderCache::new(backend, &[LIT, UNLIT]).err().unwrap();
        assert!(matches!(err, ShaderError::Compile { variant: UNLIT, .. }));
        assert_eq!(log.borrow().live_programs(), 0);
    }

    #[test]
    fn two_caches_share_no_state() {
        let mut a = cache(&[LIT]);
        let b = cache(&[LIT]);

        a.set_uniform(LIT, UniformKey::AmbientLightStrength, 0.25_f32).unwrap();

        assert_eq!(a.uniform(LIT, UniformKey::AmbientLightStrength), Some(UniformValue::Float(0.25)));
        assert_eq!(b.uniform(LIT, UniformKey::AmbientLightStrength), Some(UniformValue::Float(0.0)));
        assert!(b.backend().log().borrow().calls().iter().all(|c| !matches!(c, GpuCall::WriteUniform { .. })));
    }

    #[test]
    fn drop_releases_every_program() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let cache = ShaderCache::new(backend, &ShaderVariant::ALL).unwrap();
        assert_eq!(log.borrow().live_programs(), 2);
        drop(cache);
        assert_eq!(log.borrow().live_programs(), 0);
    }

    // ── lookup / binding ──────────────────────────────────────────────────

    #[test]
    fn get_program_for_unrequested_variant_fails() {
        let cache = cache(&[LIT]);
        assert_eq!(cache.get_program(UNLIT).err(), Some(ShaderError::VariantNotRequested(UNLIT)));
        assert_eq!(cache.get_program(LIT).unwrap().variant(), LIT);
    }

    #[test]
    fn use_program_skips_redundant_binds() {
        let mut cache = cache(&[LIT, UNLIT]);
        cache.use_program(LIT).unwrap();
        cache.use_program(LIT).unwrap();
        cache.use_program(UNLIT).unwrap();
        cache.use_program(LIT).unwrap();

        let binds = cache
            .backend()
            .log()
            .borrow()
            .calls()
            .iter()
            .filter(|c| matches!(c, GpuCall::Bind(_)))
            .count();
        assert_eq!(binds, 3);
        assert_eq!(cache.bound(), Some(LIT));
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    #[test]
    fn uniform_readback_matches_for_every_type() {
        let mut cache = cache(&[LIT]);
        let values = [
            (UniformKey::CameraToClip, UniformValue::Mat4(Mat4::perspective_rh(1.2, 1.5, 0.1, 50.0))),
            (UniformKey::DiffuseLightPosition, UniformValue::Vec3(Vec3::new(5.0, 2.0, -1.0))),
            (UniformKey::AmbientLightStrength, UniformValue::Float(0.5)),
            (UniformKey::TransformTableOffset, UniformValue::Int(3)),
        ];

        for (key, value) in values {
            cache.set_uniform(LIT, key, value).unwrap();
            cache.use_program(LIT).unwrap();

            let location = cache.get_program(LIT).unwrap().location(key).unwrap();
            let read = cache.backend().log().borrow().read_bound_uniform(location);
            assert_eq!(read, Some(value), "{key}");
        }
    }

    #[test]
    fn missing_uniform_is_skipped_and_frame_continues() {
        let mut cache = cache(&[UNLIT]);

        cache.set_uniform(UNLIT, UniformKey::CameraToClip, Mat4::IDENTITY).unwrap();
        let err = cache
            .set_uniform(UNLIT, UniformKey::DiffuseLightPosition, Vec3::ONE)
            .unwrap_err();
        assert_eq!(err, UniformError::Missing { variant: UNLIT, key: UniformKey::DiffuseLightPosition });
        cache.set_uniform(UNLIT, UniformKey::WorldToCamera, Mat4::from_scale(Vec3::splat(2.0))).unwrap();

        assert_eq!(cache.uniform(UNLIT, UniformKey::CameraToClip), Some(UniformValue::Mat4(Mat4::IDENTITY)));
        assert_eq!(
            cache.uniform(UNLIT, UniformKey::WorldToCamera),
            Some(UniformValue::Mat4(Mat4::from_scale(Vec3::splat(2.0))))
        );
        let writes = cache
            .backend()
            .log()
            .borrow()
            .calls()
            .iter()
            .filter(|c| matches!(c, GpuCall::WriteUniform { .. }))
            .count();
        assert_eq!(writes, 2);
    }

    #[test]
    fn repeated_uniform_failures_warn_once_per_variant_and_key() {
        let mut cache = cache(&[LIT, UNLIT]);
        let missing = (UNLIT, UniformKey::AmbientLightColor);
        let mismatch = (LIT, UniformKey::AmbientLightColor);

        for _ in 0..3 {
            assert!(cache.set_uniform(missing.0, missing.1, Vec3::ONE).is_err());
        }
        assert_eq!(cache.warned.len(), 1);
        assert!(cache.warned.contains(&missing));

        // Same key on another variant is a new pair.
        for _ in 0..2 {
            assert!(cache.set_uniform(mismatch.0, mismatch.1, 1.0_f32).is_err());
        }
        assert_eq!(cache.warned.len(), 2);
        assert!(cache.warned.contains(&mismatch));

        // Successful uploads never enter the set.
        cache.set_uniform(LIT, UniformKey::AmbientLightColor, Vec3::ONE).unwrap();
        assert_eq!(cache.warned.len(), 2);
    }

    #[test]
    fn type_mismatch_is_rejected_without_upload() {
        let mut cache = cache(&[LIT]);
        let err = cache
            .set_uniform(LIT, UniformKey::AmbientLightStrength, Vec3::ONE)
            .unwrap_err();
        assert_eq!(
            err,
            UniformError::TypeMismatch {
                variant: LIT,
                key: UniformKey::AmbientLightStrength,
                expected: UniformKind::Float,
                found: UniformKind::Vec3,
            }
        );
        assert_eq!(cache.uniform(LIT, UniformKey::AmbientLightStrength), Some(UniformValue::Float(0.0)));
    }

    #[test]
    fn set_uniform_on_unrequested_variant_fails() {
        let mut cache = cache(&[UNLIT]);
        assert_eq!(
            cache.set_uniform(LIT, UniformKey::CameraToClip, Mat4::IDENTITY),
            Err(UniformError::VariantNotRequested(LIT))
        );
    }
}

//! Сквозные сценарии пакетного запуска на подменных сервисах
